//! Stacking of bars along the viewport edges
//!
//! Pure geometry: given every bar's layout, state and size, compute where
//! each one goes so open bars never overlap, and how far the page content
//! has to be pushed.

use crate::options::{Family, Layout};

/// Screen width breakpoints, inclusive upper bounds
pub const BREAKPOINTS: [f32; 3] = [480.0, 600.0, 782.0];

/// Index of the breakpoint band `width` falls in
pub fn breakpoint(width: f32) -> usize {
    BREAKPOINTS.iter().position(|&b| width <= b).unwrap_or(BREAKPOINTS.len())
}

/// Per edge distances
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Offsets {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Offsets {
    pub fn get(&self, family: Family) -> f32 {
        match family {
            Family::Top => self.top,
            Family::Right => self.right,
            Family::Bottom => self.bottom,
            Family::Left => self.left,
        }
    }

    pub fn add(&mut self, family: Family, amount: f32) {
        match family {
            Family::Top => self.top += amount,
            Family::Right => self.right += amount,
            Family::Bottom => self.bottom += amount,
            Family::Left => self.left += amount,
        }
    }
}

/// What a bar is told during a stacking pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BarPosition {
    /// Distance from the bar's own edge
    pub offset: f32,
    /// Combined size of the open bars of the family
    pub family_total: f32,
    /// Edge distance if every bar of the family were open, clears toggle buttons
    pub max_offset: f32,
    /// Space taken at the top when this bar is placed
    pub top: f32,
    /// Space taken at the bottom when this bar is placed
    pub bottom: f32,
}

/// Input of a stacking pass, one per bar in document order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarMetrics {
    pub layout: Layout,
    pub open: bool,
    /// Height for top and bottom bars, width for side bars
    pub size: f32,
    pub push: bool,
}

/// Output of a stacking pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stacking {
    /// Parallel to the input, None for bars outside every family
    pub positions: Vec<Option<BarPosition>>,
    /// Edge distances after every open bar
    pub offsets: Offsets,
    /// How far pushing bars move the page content
    pub push: Offsets,
}

/// Stack `bars` starting from the `base` edge distances
pub fn stack(bars: &[BarMetrics], base: Offsets) -> Stacking {
    let mut max = base;
    let mut totals = Offsets::default();
    for bar in bars {
        let Some(family) = bar.layout.family() else { continue };
        max.add(family, bar.size);
        if bar.open {
            totals.add(family, bar.size);
        }
    }

    let mut running = base;
    let mut push = Offsets::default();
    let mut positions = vec![None; bars.len()];
    for family in Family::ORDER {
        for (i, bar) in bars.iter().enumerate() {
            if bar.layout.family() != Some(family) {
                continue;
            }
            positions[i] = Some(BarPosition {
                offset: running.get(family),
                family_total: totals.get(family),
                max_offset: max.get(family),
                top: running.top,
                bottom: running.bottom,
            });
            if bar.open {
                running.add(family, bar.size);
                if bar.push && bar.layout.can_push() {
                    push.add(family, bar.size);
                }
            }
        }
    }

    Stacking { positions, offsets: running, push }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(layout: Layout, open: bool, size: f32) -> BarMetrics {
        BarMetrics { layout, open, size, push: true }
    }

    #[test]
    fn test_breakpoints() {
        assert_eq!(breakpoint(320.0), 0);
        assert_eq!(breakpoint(480.0), 0);
        assert_eq!(breakpoint(600.0), 1);
        assert_eq!(breakpoint(700.0), 2);
        assert_eq!(breakpoint(1280.0), 3);
    }

    #[test]
    fn test_open_top_bars_stack() {
        let bars = [
            bar(Layout::Top, true, 40.0),
            bar(Layout::Top, false, 30.0),
            bar(Layout::TopInline, true, 50.0),
        ];
        let result = stack(&bars, Offsets { top: 32.0, ..Offsets::default() });
        let offsets: Vec<f32> = result.positions.iter().flatten().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![32.0, 72.0, 72.0]);
        assert_eq!(result.positions[0].map(|p| p.max_offset), Some(152.0));
        assert_eq!(result.positions[0].map(|p| p.family_total), Some(90.0));
        assert_eq!(result.push.top, 90.0);
        assert_eq!(result.offsets.top, 122.0);
    }

    #[test]
    fn test_families_are_independent() {
        let bars = [
            bar(Layout::Bottom, true, 20.0),
            bar(Layout::Top, true, 40.0),
            bar(Layout::LeftCenter, true, 300.0),
            bar(Layout::Inline, true, 10.0),
        ];
        let result = stack(&bars, Offsets::default());
        assert_eq!(result.positions[0].map(|p| p.offset), Some(0.0));
        assert_eq!(result.positions[1].map(|p| p.offset), Some(0.0));
        // side bars clear the top and bottom bars
        assert_eq!(result.positions[2].map(|p| (p.top, p.bottom)), Some((40.0, 20.0)));
        assert_eq!(result.positions[3], None);
        // left-center never pushes
        assert_eq!(result.push, Offsets { top: 40.0, bottom: 20.0, ..Offsets::default() });
    }
}
