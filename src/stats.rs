// src/stats.rs
//! Per-frame render statistics.

use std::time::Duration;

/// Counters accumulated over one frame, reset in `begin_frame`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderStats {
    pub shadow_draw_calls: u32,
    pub opaque_draw_calls: u32,
    pub transparent_draw_calls: u32,
    pub postprocess_draw_calls: u32,
    pub triangles: u64,
    pub postprocess_passes: u32,
    pub entities_culled: u32,
    pub frame_time: Duration,
}

impl RenderStats {
    pub fn reset(&mut self) {
        *self = RenderStats::default();
    }

    pub fn total_draw_calls(&self) -> u32 {
        self.shadow_draw_calls
            + self.opaque_draw_calls
            + self.transparent_draw_calls
            + self.postprocess_draw_calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_clears_all_counters() {
        let mut stats = RenderStats {
            shadow_draw_calls: 3,
            opaque_draw_calls: 7,
            triangles: 1234,
            frame_time: Duration::from_millis(16),
            ..Default::default()
        };
        stats.reset();
        assert_eq!(stats, RenderStats::default());
        assert_eq!(stats.total_draw_calls(), 0);
    }
}
