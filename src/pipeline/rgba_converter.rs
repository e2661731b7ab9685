use anyhow::{Result, anyhow};
use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

/// Decoded camera image: tightly packed RGBA rows.
#[derive(Debug)]
pub struct RgbaImage {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub fn to_rgba(buffer: &Buffer) -> Result<RgbaImage> {
    let res = buffer.resolution();
    let (width, height) = (res.width_x, res.height_y);
    let data = buffer.buffer();
    let pixels = width as usize * height as usize;

    let rgba = match buffer.source_frame_format() {
        FrameFormat::MJPEG => return decode_mjpeg(data),
        FrameFormat::NV12 => {
            expect_len("NV12", data, pixels * 3 / 2)?;
            nv12(data, width, height)?
        }
        FrameFormat::YUYV => {
            expect_len("YUYV", data, pixels * 2)?;
            yuyv(data, width, height)?
        }
        FrameFormat::RAWRGB => {
            expect_len("RGB", data, pixels * 3)?;
            expand(&data[..pixels * 3], 3, |src, dst| dst[..3].copy_from_slice(src))
        }
        FrameFormat::RAWBGR => {
            expect_len("BGR", data, pixels * 3)?;
            expand(&data[..pixels * 3], 3, |src, dst| {
                dst[0] = src[2];
                dst[1] = src[1];
                dst[2] = src[0];
            })
        }
        FrameFormat::GRAY => {
            expect_len("GRAY", data, pixels)?;
            expand(&data[..pixels], 1, |src, dst| dst[..3].fill(src[0]))
        }
    };

    Ok(RgbaImage {
        rgba,
        width,
        height,
    })
}

fn expect_len(format: &str, data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(anyhow!(
            "{format} buffer too small: got {}, expected {expected}",
            data.len()
        ));
    }
    Ok(())
}

// Widen `src_bpp`-byte pixels into opaque RGBA.
fn expand<F>(data: &[u8], src_bpp: usize, fill: F) -> Vec<u8>
where
    F: Fn(&[u8], &mut [u8]) + Sync,
{
    let pixels = data.len() / src_bpp;
    let mut rgba = vec![255u8; pixels * 4];
    rgba.par_chunks_exact_mut(4)
        .zip(data.par_chunks_exact(src_bpp))
        .for_each(|(dst, src)| fill(src, dst));
    rgba
}

fn nv12(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_len = width as usize * height as usize;
    let image = YuvBiPlanarImage {
        y_plane: &data[..y_len],
        y_stride: width,
        uv_plane: &data[y_len..y_len + y_len / 2],
        uv_stride: width,
        width,
        height,
    };
    let mut rgba = vec![0u8; y_len * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12 conversion failed: {err:?}"))?;
    Ok(rgba)
}

fn yuyv(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };
    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV conversion failed: {err:?}"))?;
    Ok(rgba)
}

fn decode_mjpeg(data: &[u8]) -> Result<RgbaImage> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("MJPEG decoder produced no image info"))?;
    let (width, height) = (info.width as u32, info.height as u32);
    expect_len("MJPEG output", &rgba, width as usize * height as usize * 4)?;
    Ok(RgbaImage {
        rgba,
        width,
        height,
    })
}
