use std::{
    thread,
    time::{Duration, Instant},
};

use crate::{
    config::Settings,
    control::{PointerController, ScrollController, VolumeController},
    gesture::GestureSignals,
    hand::{HandModel, build_hands},
    landmarks::LandmarkAdapter,
    output::{InputSink, VolumeControl},
    pipeline::camera::FrameSource,
    types::{Frame, Handedness},
};

const IDLE_POLL: Duration = Duration::from_millis(2);

/// What happened to one frame handed to [`Orchestrator::process_frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Same capture as the previous call.
    Duplicate,
    /// Dropped by frame decimation.
    Skipped,
    Processed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub received: u64,
    pub processed: u64,
    pub skipped: u64,
    pub detect_failures: u64,
}

/// Runs the per-frame cycle: decimation, detection, classification and the
/// arbitration between volume mode and pointer/scroll mode.
pub struct Orchestrator<L, I, V> {
    settings: Settings,
    landmarker: L,
    input: I,
    volume_backend: V,
    pointer: PointerController,
    scroll_left: ScrollController,
    scroll_right: ScrollController,
    volume: VolumeController,
    last_sequence: Option<u64>,
    stats: FrameStats,
}

impl<L, I, V> Orchestrator<L, I, V>
where
    L: LandmarkAdapter,
    I: InputSink,
    V: VolumeControl,
{
    pub fn new(
        settings: Settings,
        landmarker: L,
        input: I,
        mut volume_backend: V,
        screen_size: (u32, u32),
    ) -> Self {
        let volume = VolumeController::new(settings.volume.clone(), &mut volume_backend);
        Self {
            pointer: PointerController::new(settings.pointer.clone(), screen_size.0, screen_size.1),
            scroll_left: ScrollController::new(Handedness::Left, settings.scroll.clone()),
            scroll_right: ScrollController::new(Handedness::Right, settings.scroll.clone()),
            volume,
            settings,
            landmarker,
            input,
            volume_backend,
            last_sequence: None,
            stats: FrameStats::default(),
        }
    }

    #[cfg(test)]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Poll `source` until `shutdown` returns true. A frame already in
    /// progress always finishes before the flag is checked again.
    pub fn run(&mut self, source: &FrameSource, shutdown: impl Fn() -> bool) -> FrameStats {
        self.wait_for_first_frame(source, &shutdown);

        while !shutdown() {
            match source.read() {
                Some(frame) if self.last_sequence != Some(frame.sequence) => {
                    self.process_frame(frame, Instant::now());
                }
                _ => thread::sleep(IDLE_POLL),
            }
        }

        let stats = self.stats;
        log::info!(
            "frames: {} received, {} processed, {} skipped, {} detection failures",
            stats.received,
            stats.processed,
            stats.skipped,
            stats.detect_failures
        );
        stats
    }

    fn wait_for_first_frame(&self, source: &FrameSource, shutdown: &impl Fn() -> bool) {
        let deadline = Instant::now() + self.settings.warmup;
        while source.read().is_none() {
            if shutdown() {
                return;
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "no camera frame within {:?}, continuing to wait",
                    self.settings.warmup
                );
                return;
            }
            thread::sleep(IDLE_POLL);
        }
    }

    pub fn process_frame(&mut self, frame: Frame, now: Instant) -> FrameOutcome {
        if self.last_sequence == Some(frame.sequence) {
            return FrameOutcome::Duplicate;
        }
        self.last_sequence = Some(frame.sequence);
        self.stats.received += 1;

        if self.stats.received % self.settings.frame_skip.max(1) != 0 {
            self.stats.skipped += 1;
            return FrameOutcome::Skipped;
        }
        self.stats.processed += 1;
        log::trace!(
            "frame {} is {:?} old",
            frame.sequence,
            now.saturating_duration_since(frame.timestamp)
        );

        let (width, height) = (frame.width, frame.height);
        let hands = self.detect_hands(frame);
        let signals =
            GestureSignals::from_hands(&hands, &self.settings.thumbs_up, &self.settings.pointer);

        let step = self.volume.update(signals.spread, &mut self.volume_backend);
        if step.is_active() {
            return FrameOutcome::Processed;
        }

        for (scroll, thumbs_up) in [
            (&mut self.scroll_left, signals.thumbs_up_left),
            (&mut self.scroll_right, signals.thumbs_up_right),
        ] {
            if let Some(amount) = scroll.update(thumbs_up, now) {
                if let Err(err) = self.input.scroll(amount) {
                    log::warn!("scroll {amount} failed: {err:#}");
                }
            }
        }

        if let Some(tip) = signals.pointer {
            let update = self.pointer.update(tip, signals.pinch, (width, height), now);
            let (x, y) = update.cursor;
            if let Err(err) = self.input.move_cursor_to(x, y) {
                log::warn!("cursor move failed: {err:#}");
            }
            for button in update.clicks {
                log::debug!("{button:?} click");
                if let Err(err) = self.input.click(button) {
                    log::warn!("{button:?} click failed: {err:#}");
                }
            }
        }

        FrameOutcome::Processed
    }

    // Detection failures count as an empty frame so the controllers still
    // see the hands disappear.
    fn detect_hands(&mut self, frame: Frame) -> Vec<HandModel> {
        let frame = if self.settings.mirror {
            match frame.mirrored() {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!("failed to mirror frame: {err:#}");
                    self.stats.detect_failures += 1;
                    return Vec::new();
                }
            }
        } else {
            frame
        };

        match self.landmarker.detect(&frame) {
            Ok(raw) => build_hands(&raw, frame.width, frame.height),
            Err(err) => {
                log::warn!("hand detection failed: {err:#}");
                self.stats.detect_failures += 1;
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use anyhow::{Result, anyhow};

    use super::*;
    use crate::{
        hand::test_support::{flat_raw, set, thumbs_up_raw},
        landmarks::{RawHand, index},
        pipeline::camera::FrameGrabber,
        types::MouseButton,
    };

    const W: u32 = 640;
    const H: u32 = 480;

    #[derive(Debug, PartialEq)]
    enum Event {
        Move,
        Click(MouseButton),
        Scroll(i32),
        SetVolume(u8),
    }

    #[derive(Default)]
    struct World {
        hands: Vec<RawHand>,
        fail_detect: bool,
        detect_calls: usize,
        first_pixel: Option<u8>,
        volume: u8,
        volume_unreadable: bool,
        events: Vec<Event>,
    }

    type Shared = Rc<RefCell<World>>;

    struct FakeLandmarker(Shared);
    struct FakeInput(Shared);
    struct FakeVolume(Shared);

    impl LandmarkAdapter for FakeLandmarker {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<RawHand>> {
            let mut world = self.0.borrow_mut();
            world.detect_calls += 1;
            world.first_pixel = frame.rgba.first().copied();
            if world.fail_detect {
                return Err(anyhow!("model exploded"));
            }
            Ok(world.hands.clone())
        }
    }

    impl InputSink for FakeInput {
        fn move_cursor_to(&mut self, _x: f32, _y: f32) -> Result<()> {
            self.0.borrow_mut().events.push(Event::Move);
            Ok(())
        }

        fn click(&mut self, button: MouseButton) -> Result<()> {
            self.0.borrow_mut().events.push(Event::Click(button));
            Ok(())
        }

        fn scroll(&mut self, amount: i32) -> Result<()> {
            self.0.borrow_mut().events.push(Event::Scroll(amount));
            Ok(())
        }
    }

    impl VolumeControl for FakeVolume {
        fn volume_percent(&mut self) -> Result<u8> {
            let world = self.0.borrow();
            if world.volume_unreadable {
                return Err(anyhow!("no mixer"));
            }
            Ok(world.volume)
        }

        fn set_volume_percent(&mut self, percent: u8) -> Result<()> {
            let mut world = self.0.borrow_mut();
            world.volume = percent;
            world.events.push(Event::SetVolume(percent));
            Ok(())
        }
    }

    fn settings() -> Settings {
        Settings {
            frame_skip: 1,
            mirror: false,
            ..Settings::default()
        }
    }

    type TestOrchestrator = Orchestrator<FakeLandmarker, FakeInput, FakeVolume>;

    fn orchestrator(settings: Settings) -> (TestOrchestrator, Shared) {
        orchestrator_in(
            settings,
            World {
                volume: 50,
                ..Default::default()
            },
        )
    }

    fn orchestrator_in(settings: Settings, world: World) -> (TestOrchestrator, Shared) {
        let world: Shared = Rc::new(RefCell::new(world));
        let orch = Orchestrator::new(
            settings,
            FakeLandmarker(world.clone()),
            FakeInput(world.clone()),
            FakeVolume(world.clone()),
            (1920, 1080),
        );
        (orch, world)
    }

    fn frame(sequence: u64) -> Frame {
        Frame {
            rgba: Vec::new(),
            width: W,
            height: H,
            timestamp: Instant::now(),
            sequence,
        }
    }

    fn px(x: f32, y: f32) -> (f32, f32) {
        (x / W as f32, y / H as f32)
    }

    // A hand with its wrist at the given pixel and no pinch or thumbs-up.
    fn hand_with_wrist(handedness: Handedness, x: f32, y: f32) -> RawHand {
        let mut raw = flat_raw(handedness);
        let (nx, ny) = px(x, y);
        set(&mut raw, index::WRIST, nx, ny);
        set(&mut raw, index::THUMB_TIP, 0.1, 0.1);
        raw
    }

    fn events(world: &Shared) -> Vec<Event> {
        std::mem::take(&mut world.borrow_mut().events)
    }

    #[test]
    fn two_hands_adjust_volume_and_suppress_pointer() {
        let mut s = settings();
        s.volume.smoothing = 0.5;
        let (mut orch, world) = orchestrator(s);
        let t0 = Instant::now();

        world.borrow_mut().hands = vec![
            hand_with_wrist(Handedness::Left, 100.0, 200.0),
            hand_with_wrist(Handedness::Right, 300.0, 200.0),
        ];
        orch.process_frame(frame(1), t0);
        assert!(events(&world).is_empty(), "activation only seeds");

        // 200 px -> 160 px: smoothed 180, deviation -20, change -20 * 0.5.
        world.borrow_mut().hands[1] = hand_with_wrist(Handedness::Right, 260.0, 200.0);
        orch.process_frame(frame(2), t0 + Duration::from_millis(33));
        assert_eq!(events(&world), vec![Event::SetVolume(40)]);
    }

    #[test]
    fn pinch_clicks_respect_cooldown() {
        let (mut orch, world) = orchestrator(settings());
        let mut raw = flat_raw(Handedness::Right);
        // Thumb at (320, 240), index tip 30 px right: 900 < 1600.
        set(&mut raw, index::THUMB_TIP, 0.5, 0.5);
        let (ix, iy) = px(350.0, 240.0);
        set(&mut raw, index::INDEX_TIP, ix, iy);
        set(&mut raw, index::MIDDLE_TIP, 0.9, 0.9);
        world.borrow_mut().hands = vec![raw];

        let t0 = Instant::now();
        orch.process_frame(frame(1), t0);
        assert_eq!(
            events(&world),
            vec![Event::Move, Event::Click(MouseButton::Left)]
        );

        orch.process_frame(frame(2), t0 + Duration::from_millis(100));
        assert_eq!(events(&world), vec![Event::Move]);

        orch.process_frame(frame(3), t0 + Duration::from_millis(310));
        assert_eq!(
            events(&world),
            vec![Event::Move, Event::Click(MouseButton::Left)]
        );
    }

    #[test]
    fn held_thumbs_up_scrolls_initial_then_sustained() {
        let (mut orch, world) = orchestrator(settings());
        world.borrow_mut().hands = vec![thumbs_up_raw(Handedness::Right)];

        let t0 = Instant::now();
        let mut fired = Vec::new();
        for (i, ms) in (0..=2000).step_by(100).enumerate() {
            orch.process_frame(frame(i as u64 + 1), t0 + Duration::from_millis(ms));
            for event in events(&world) {
                if let Event::Scroll(amount) = event {
                    fired.push((ms, amount));
                }
            }
        }
        assert_eq!(fired, vec![(0, 15), (1500, 8), (2000, 8)]);
    }

    #[test]
    fn left_thumbs_up_scrolls_down() {
        let (mut orch, world) = orchestrator(settings());
        world.borrow_mut().hands = vec![thumbs_up_raw(Handedness::Left)];
        orch.process_frame(frame(1), Instant::now());
        assert!(events(&world).contains(&Event::Scroll(-15)));
    }

    #[test]
    fn only_every_nth_frame_is_processed() {
        let (mut orch, world) = orchestrator(Settings {
            frame_skip: 3,
            ..settings()
        });
        let now = Instant::now();
        let outcomes: Vec<_> = (1..=6).map(|seq| orch.process_frame(frame(seq), now)).collect();

        use FrameOutcome::*;
        assert_eq!(outcomes, vec![Skipped, Skipped, Processed, Skipped, Skipped, Processed]);
        assert_eq!(world.borrow().detect_calls, 2);
        assert_eq!(
            orch.stats(),
            FrameStats {
                received: 6,
                processed: 2,
                skipped: 4,
                detect_failures: 0,
            }
        );
    }

    #[test]
    fn same_capture_is_not_processed_twice() {
        let (mut orch, world) = orchestrator(settings());
        let now = Instant::now();
        assert_eq!(orch.process_frame(frame(7), now), FrameOutcome::Processed);
        assert_eq!(orch.process_frame(frame(7), now), FrameOutcome::Duplicate);
        assert_eq!(world.borrow().detect_calls, 1);
    }

    #[test]
    fn detection_failure_releases_held_scroll() {
        let (mut orch, world) = orchestrator(settings());
        world.borrow_mut().hands = vec![thumbs_up_raw(Handedness::Right)];
        let t0 = Instant::now();
        orch.process_frame(frame(1), t0);
        assert_eq!(events(&world), vec![Event::Scroll(15), Event::Move]);

        world.borrow_mut().fail_detect = true;
        assert_eq!(
            orch.process_frame(frame(2), t0 + Duration::from_millis(600)),
            FrameOutcome::Processed
        );
        assert!(events(&world).is_empty());
        assert_eq!(orch.stats().detect_failures, 1);

        // A fresh gesture after the cooldown fires the big pulse again.
        world.borrow_mut().fail_detect = false;
        orch.process_frame(frame(3), t0 + Duration::from_millis(700));
        assert_eq!(events(&world), vec![Event::Scroll(15), Event::Move]);
    }

    #[test]
    fn disabled_volume_lets_two_hands_drive_the_pointer() {
        let mut s = settings();
        s.volume.enabled = false;
        let (mut orch, world) = orchestrator(s);
        world.borrow_mut().hands = vec![
            hand_with_wrist(Handedness::Left, 100.0, 200.0),
            hand_with_wrist(Handedness::Right, 300.0, 200.0),
        ];
        orch.process_frame(frame(1), Instant::now());
        assert_eq!(events(&world), vec![Event::Move]);
    }

    #[test]
    fn mirrored_frame_reaches_the_detector() {
        let (mut orch, world) = orchestrator(Settings {
            mirror: true,
            ..settings()
        });
        let frame = Frame {
            rgba: vec![1, 1, 1, 255, 2, 2, 2, 255],
            width: 2,
            height: 1,
            timestamp: Instant::now(),
            sequence: 1,
        };
        orch.process_frame(frame, Instant::now());
        assert_eq!(world.borrow().first_pixel, Some(2));
    }

    #[test]
    fn unreadable_volume_lets_two_hands_drive_the_pointer() {
        let (mut orch, world) = orchestrator_in(
            settings(),
            World {
                volume_unreadable: true,
                ..Default::default()
            },
        );
        world.borrow_mut().hands = vec![
            hand_with_wrist(Handedness::Left, 100.0, 200.0),
            hand_with_wrist(Handedness::Right, 300.0, 200.0),
        ];
        let t0 = Instant::now();
        orch.process_frame(frame(1), t0);
        world.borrow_mut().hands[1] = hand_with_wrist(Handedness::Right, 200.0, 200.0);
        orch.process_frame(frame(2), t0 + Duration::from_millis(33));

        assert_eq!(events(&world), vec![Event::Move, Event::Move]);
    }

    // Emits a 1x1 frame every couple of milliseconds, after an optional delay.
    struct TickingGrabber {
        delay: Option<Duration>,
    }

    impl FrameGrabber for TickingGrabber {
        fn grab(&mut self) -> Result<(Vec<u8>, u32, u32)> {
            if let Some(delay) = self.delay.take() {
                thread::sleep(delay);
            }
            thread::sleep(Duration::from_millis(2));
            Ok((vec![0, 0, 0, 255], 1, 1))
        }
    }

    struct DeadGrabber;

    impl FrameGrabber for DeadGrabber {
        fn grab(&mut self) -> Result<(Vec<u8>, u32, u32)> {
            thread::sleep(Duration::from_millis(2));
            Err(anyhow!("no signal"))
        }
    }

    #[test]
    fn run_stops_on_shutdown_after_finishing_the_frame() {
        let (mut orch, world) = orchestrator(Settings {
            frame_skip: 2,
            ..settings()
        });
        let mut source = FrameSource::start_with(|| {
            Ok(TickingGrabber {
                delay: Some(Duration::from_millis(30)),
            })
        })
        .unwrap();

        let stats = orch.run(&source, || world.borrow().detect_calls >= 5);

        assert_eq!(world.borrow().detect_calls, 5);
        assert_eq!(stats.processed, 5);
        assert_eq!(stats.received, 10);
        assert_eq!(stats.received, stats.processed + stats.skipped);
        assert_eq!(stats, orch.stats());
        // Polling faster than capture never counts a capture twice.
        assert!(source.read().unwrap().sequence >= stats.received);

        source.stop();
        source.stop();
        assert!(!source.is_running());
    }

    #[test]
    fn run_returns_at_once_when_shutdown_is_already_requested() {
        let (mut orch, world) = orchestrator(settings());
        let mut source =
            FrameSource::start_with(|| Ok(TickingGrabber { delay: None })).unwrap();

        let stats = orch.run(&source, || true);

        assert_eq!(stats, FrameStats::default());
        assert_eq!(world.borrow().detect_calls, 0);
        source.stop();
    }

    #[test]
    fn warmup_gives_up_on_a_silent_camera() {
        let (mut orch, world) = orchestrator(Settings {
            warmup: Duration::from_millis(20),
            ..settings()
        });
        let mut source = FrameSource::start_with(|| Ok(DeadGrabber)).unwrap();

        let started = Instant::now();
        let stats = orch.run(&source, || started.elapsed() >= Duration::from_millis(80));

        assert!(started.elapsed() >= Duration::from_millis(80));
        assert_eq!(stats, FrameStats::default());
        assert_eq!(world.borrow().detect_calls, 0);
        source.stop();
    }
}
