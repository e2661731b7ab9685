use crate::{
    config::{PointerSettings, ThumbsUpSettings},
    hand::{HandModel, Keypoint},
    types::Handedness,
};

/// Squared pixel distance; thresholds are compared pre-squared.
pub fn distance_sq(a: &Keypoint, b: &Keypoint) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

pub fn left_pinch_sq(hand: &HandModel) -> f32 {
    distance_sq(&hand.index.tip, &hand.thumb.tip)
}

pub fn right_pinch_sq(hand: &HandModel) -> f32 {
    distance_sq(&hand.middle.tip, &hand.thumb.tip)
}

/// Thumb raised and straight while the other four fingers curl toward the
/// palm. Uses normalized heights only, so it ignores where the hand is.
pub fn is_thumbs_up(hand: &HandModel, cfg: &ThumbsUpSettings) -> bool {
    let thumb_raised = hand.thumb.tip.level - hand.index.knuckle.level < cfg.thumb_above_index;
    let thumb_straight = hand.thumb.tip.level - hand.thumb.knuckle.level < cfg.thumb_straight;
    let fingers_bent = hand
        .fingers()
        .iter()
        .all(|d| d.tip.level - d.knuckle.level > cfg.finger_bent);

    thumb_raised && thumb_straight && fingers_bent
}

/// Wrist-to-wrist distance when exactly one left and one right hand are visible.
pub fn two_hand_spread(hands: &[HandModel]) -> Option<f32> {
    let [a, b] = hands else {
        return None;
    };
    if a.handedness == b.handedness {
        return None;
    }
    Some(distance_sq(&a.wrist, &b.wrist).sqrt())
}

/// Right hand if present, otherwise whichever hand came first.
pub fn pointer_hand(hands: &[HandModel]) -> Option<&HandModel> {
    hands
        .iter()
        .find(|h| h.handedness == Handedness::Right)
        .or_else(|| hands.first())
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PinchSignals {
    pub left: bool,
    pub right: bool,
}

/// Everything the controllers need from one frame's hands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GestureSignals {
    pub thumbs_up_left: bool,
    pub thumbs_up_right: bool,
    pub spread: Option<f32>,
    /// Index fingertip of the pointer hand, in frame pixels.
    pub pointer: Option<(f32, f32)>,
    pub pinch: PinchSignals,
}

impl GestureSignals {
    pub fn from_hands(
        hands: &[HandModel],
        thumbs_up: &ThumbsUpSettings,
        pointer: &PointerSettings,
    ) -> Self {
        let mut signals = GestureSignals {
            spread: two_hand_spread(hands),
            ..Default::default()
        };

        for hand in hands {
            if is_thumbs_up(hand, thumbs_up) {
                match hand.handedness {
                    Handedness::Left => signals.thumbs_up_left = true,
                    Handedness::Right => signals.thumbs_up_right = true,
                }
            }
        }

        if let Some(hand) = pointer_hand(hands) {
            signals.pointer = Some((hand.index.tip.x, hand.index.tip.y));
            signals.pinch = PinchSignals {
                left: left_pinch_sq(hand) < pointer.left_click_dist_sq,
                right: right_pinch_sq(hand) < pointer.right_click_dist_sq,
            };
        }

        signals
    }
}
