use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{GenericImageView, Rgb, RgbImage};

use super::ImagePayload;
use crate::model::ImageAsset;

const JPEG_QUALITY: u8 = 85;

/// Downscale so the longest edge is at most `max_edge`, flatten transparency
/// onto white and re-encode as JPEG. `None` when the payload cannot be decoded.
pub fn prepare_payload(asset: &ImageAsset, max_edge: u32) -> Option<ImagePayload> {
    let decoded = match image::load_from_memory(&asset.data) {
        Ok(img) => img,
        Err(e) => {
            log::warn!("Cannot decode image {} for the model: {e}", asset.id);
            return None;
        }
    };

    let (w, h) = decoded.dimensions();
    let resized = if w.max(h) > max_edge {
        decoded.resize(max_edge, max_edge, FilterType::Triangle)
    } else {
        decoded
    };

    let rgba = resized.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend =
            |channel: u8| -> u8 { ((u16::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8 };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }

    let mut data = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut data, JPEG_QUALITY);
    if let Err(e) = encoder.encode_image(&flattened) {
        log::warn!("Cannot encode image {} for the model: {e}", asset.id);
        return None;
    }

    Some(ImagePayload {
        asset: asset.id,
        mime_type: "image/jpeg",
        data,
        width: flattened.width(),
        height: flattened.height(),
    })
}

/// Visual payloads for one call: the first `cap` decodable assets by source
/// ordinal.
pub fn select_payloads(assets: &[ImageAsset], cap: usize, max_edge: u32) -> Vec<ImagePayload> {
    let mut ordered: Vec<&ImageAsset> = assets.iter().collect();
    ordered.sort_by_key(|a| a.ordinal);

    let mut payloads = Vec::with_capacity(cap.min(assets.len()));
    for asset in ordered {
        if payloads.len() >= cap {
            break;
        }
        if let Some(payload) = prepare_payload(asset, max_edge) {
            payloads.push(payload);
        }
    }
    if payloads.len() < assets.len() {
        log::info!(
            "Attaching {} of {} images (cap {cap}); the rest are described in text only",
            payloads.len(),
            assets.len()
        );
    }
    payloads
}
