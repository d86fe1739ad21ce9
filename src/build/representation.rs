use crate::geometry::Geometry;
use crate::index::RecordKind;
use crate::shapefile::{Feature, ShapeKind};

/// Point datasets store one point per entry, everything else its envelope
pub fn select_record_kind(shape: ShapeKind) -> RecordKind {
    match shape {
        ShapeKind::Point => RecordKind::Point,
        ShapeKind::Other => RecordKind::Rectangle,
    }
}

/// One `(geometry, identifier)` pair on its way into the store
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub geometry: Geometry,
    pub id: String,
}

impl IndexEntry {
    pub fn from_feature(feature: &Feature, kind: RecordKind) -> Self {
        let envelope = feature.envelope();
        let geometry = match kind {
            RecordKind::Point => Geometry::Point(envelope.centroid()),
            RecordKind::Rectangle => Geometry::Rect(envelope),
        };
        Self {
            geometry,
            id: feature.id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Rect};
    use crate::shapefile::ShapeType;

    fn feature(shape_type: ShapeType, envelope: Rect) -> Feature {
        Feature {
            id: "7".to_string(),
            shape_type,
            envelope,
        }
    }

    #[test]
    fn test_select_record_kind() {
        assert_eq!(select_record_kind(ShapeKind::Point), RecordKind::Point);
        assert_eq!(select_record_kind(ShapeKind::Other), RecordKind::Rectangle);
        assert_eq!(
            select_record_kind(ShapeType::MultiPoint.kind()),
            RecordKind::Rectangle
        );
        assert_eq!(select_record_kind(ShapeType::PointZ.kind()), RecordKind::Point);
    }

    #[test]
    fn test_point_entry_is_centroid() {
        let f = feature(ShapeType::Point, Rect::new(3.0, 4.0, 3.0, 4.0));
        let entry = IndexEntry::from_feature(&f, RecordKind::Point);
        assert_eq!(entry.geometry, Geometry::Point(Point::new(3.0, 4.0)));
        assert_eq!(entry.id, "7");
    }

    #[test]
    fn test_rect_entry_is_envelope() {
        let envelope = Rect::new(0.0, 0.0, 10.0, 5.0);
        let f = feature(ShapeType::Polygon, envelope);
        let entry = IndexEntry::from_feature(&f, RecordKind::Rectangle);
        assert_eq!(entry.geometry, Geometry::Rect(envelope));
    }
}
