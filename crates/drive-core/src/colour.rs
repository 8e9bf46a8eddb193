use image::ImageError;

/// Used when an avatar cannot be fetched or decoded
pub const DEFAULT_COLOUR: u32 = 0x5865F2;

/// Average RGB of an encoded image, packed as 0xRRGGBB
pub fn average_colour(encoded: &[u8]) -> Result<u32, ImageError> {
    let rgb = image::load_from_memory(encoded)?.to_rgb8();
    let pixels = u64::from(rgb.width()) * u64::from(rgb.height());
    if pixels == 0 {
        return Ok(DEFAULT_COLOUR);
    }

    let mut sums = [0u64; 3];
    for pixel in rgb.pixels() {
        for (sum, channel) in sums.iter_mut().zip(pixel.0) {
            *sum += u64::from(channel);
        }
    }
    let [r, g, b] = sums.map(|s| (s / pixels) as u32);
    Ok((r << 16) | (g << 8) | b)
}
