// 取帧位置与输出尺寸
//
// 两种抽帧策略共用同一套规则，保证同一媒体无论走哪条路径结果都一致

/// 时长超过该值（秒）时不取第 0 帧
pub const LONG_MEDIA_THRESHOLD_SECS: f64 = 3.0;

/// 跳过片头黑帧的偏移（秒）
pub const LEADING_FRAME_OFFSET_SECS: f64 = 1.0;

/// 根据媒体时长选择取帧时间点（秒）
///
/// 很多视频开头是黑帧或淡入，较长的媒体跳到固定的小偏移处取帧；
/// 短媒体（或时长未知）直接取第 0 帧
pub fn seek_position(duration_seconds: f64) -> f64 {
    if duration_seconds.is_finite() && duration_seconds > LONG_MEDIA_THRESHOLD_SECS {
        LEADING_FRAME_OFFSET_SECS
    } else {
        0.0
    }
}

/// 计算输出尺寸：固定高度，宽度按原始比例缩放（至少 1 像素）
pub fn output_dimensions(width: u32, height: u32, target_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || target_height == 0 {
        return (0, 0);
    }
    let scaled = (width as u64 * target_height as u64 + height as u64 / 2) / height as u64;
    let scaled_width = scaled.clamp(1, u32::MAX as u64) as u32;
    (scaled_width, target_height)
}
