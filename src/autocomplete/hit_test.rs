//! Pointer hit-testing for input + dropdown pairs

/// A pointer position in front-end coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle; the right and bottom edges are exclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }
}

/// The area owned by one autocomplete field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidgetRegion {
    pub input: Rect,
    /// Only present while the dropdown is laid out
    pub dropdown: Option<Rect>,
}

impl WidgetRegion {
    pub fn new(input: Rect) -> Self {
        Self {
            input,
            dropdown: None,
        }
    }

    pub fn with_dropdown(mut self, dropdown: Rect) -> Self {
        self.dropdown = Some(dropdown);
        self
    }

    pub fn contains(&self, point: Point) -> bool {
        self.input.contains(point) || self.dropdown.is_some_and(|d| d.contains(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_covers_input_and_dropdown() {
        let region = WidgetRegion::new(Rect::new(0.0, 0.0, 100.0, 20.0))
            .with_dropdown(Rect::new(0.0, 20.0, 100.0, 80.0));

        assert!(region.contains(Point::new(10.0, 10.0)));
        assert!(region.contains(Point::new(99.0, 60.0)));
        assert!(!region.contains(Point::new(100.0, 10.0)));
        assert!(!region.contains(Point::new(50.0, 100.0)));

        let bare = WidgetRegion::new(region.input);
        assert!(!bare.contains(Point::new(50.0, 60.0)));
    }
}
