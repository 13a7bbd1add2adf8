//! Icon generation for the system tray.
//!
//! Icons are drawn programmatically as RGBA data; no image assets are
//! shipped.

use tray_icon::Icon;

/// Icon size in pixels.
pub const ICON_SIZE: u32 = 32;

/// Generate the tray icon for the given listener state.
///
/// Green disc while the listener is active, gray while disabled.
pub fn create_status_icon(active: bool) -> Result<Icon, String> {
    let rgba = generate_status_icon(active);
    Icon::from_rgba(rgba, ICON_SIZE, ICON_SIZE).map_err(|e| e.to_string())
}

/// Generate the status icon as RGBA data.
fn generate_status_icon(active: bool) -> Vec<u8> {
    let size = ICON_SIZE as usize;
    let mut rgba = vec![0u8; size * size * 4];

    let center = size as f32 / 2.0;
    let radius = size as f32 / 2.0 - 3.0;

    let (r, g, b) = if active {
        (40u8, 200u8, 120u8) // Green while listening
    } else {
        (150u8, 150u8, 150u8) // Gray while disabled
    };

    // Draw filled circle
    for y in 0..size {
        for x in 0..size {
            let idx = (y * size + x) * 4;
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let dist = (dx * dx + dy * dy).sqrt();

            if dist < radius {
                rgba[idx] = r;
                rgba[idx + 1] = g;
                rgba[idx + 2] = b;
                rgba[idx + 3] = 255;
            } else if dist < radius + 1.0 {
                // Anti-aliased edge
                let alpha = ((radius + 1.0 - dist) * 255.0) as u8;
                rgba[idx] = r;
                rgba[idx + 1] = g;
                rgba[idx + 2] = b;
                rgba[idx + 3] = alpha;
            }
        }
    }

    draw_microphone_shape(&mut rgba, size);

    rgba
}

/// Draw a simplified microphone glyph over the disc.
fn draw_microphone_shape(rgba: &mut [u8], size: usize) {
    let color = 255u8;
    let center_x = size / 2;

    // Microphone body (vertical rectangle in center)
    let body_width = size / 4;
    let body_height = size / 2;
    let body_top = size / 4;

    for y in body_top..(body_top + body_height) {
        for x in (center_x - body_width / 2)..(center_x + body_width / 2) {
            if x < size && y < size {
                let idx = (y * size + x) * 4;
                if rgba[idx + 3] > 0 {
                    rgba[idx] = color;
                    rgba[idx + 1] = color;
                    rgba[idx + 2] = color;
                }
            }
        }
    }

    // Microphone stand (small line at bottom)
    let stand_y = body_top + body_height;
    if stand_y + 2 < size {
        for y in stand_y..(stand_y + 3) {
            let idx = (y * size + center_x) * 4;
            if rgba[idx + 3] > 0 {
                rgba[idx] = color;
                rgba[idx + 1] = color;
                rgba[idx + 2] = color;
            }
        }
    }
}
