//! Structural geometry validation
//!
//! Checks the constraints a geometry must satisfy to be serializable at all:
//! finite coordinates, minimum point counts, closed polygon rings. Deeper
//! validity (self-intersection and the like) is handled by the buffer-fix
//! stage in [`crate::condition`].

use geo::Geometry;

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    pub fn add_error(&mut self, location: String, reason: String) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, reason });
    }

    fn absorb(&mut self, prefix: &str, other: ValidationResult) {
        for error in other.errors {
            self.add_error(format!("{prefix}.{}", error.location), error.reason);
        }
    }
}

/// Validate a geometry's structure
pub fn validate_geometry(geometry: &Geometry<f64>) -> ValidationResult {
    match geometry {
        Geometry::Point(p) => validate_point(p),
        Geometry::Line(l) => {
            let line: geo::LineString<f64> = vec![l.start, l.end].into();
            validate_linestring(&line)
        }
        Geometry::LineString(ls) => validate_linestring(ls),
        Geometry::Polygon(poly) => validate_polygon(poly),
        Geometry::Rect(r) => validate_polygon(&r.to_polygon()),
        Geometry::Triangle(t) => validate_polygon(&t.to_polygon()),
        Geometry::MultiPoint(mp) => validate_multipoint(mp),
        Geometry::MultiLineString(mls) => validate_multilinestring(mls),
        Geometry::MultiPolygon(mp) => validate_multipolygon(mp),
        Geometry::GeometryCollection(gc) => {
            let mut result = ValidationResult::valid();
            for (i, member) in gc.iter().enumerate() {
                result.absorb(&format!("GeometryCollection[{i}]"), validate_geometry(member));
            }
            result
        }
    }
}

fn validate_point(point: &geo::Point<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();
    if !point.x().is_finite() || !point.y().is_finite() {
        result.add_error(
            format!("Point({}, {})", point.x(), point.y()),
            "Coordinates must be finite".to_string(),
        );
    }
    result
}

fn validate_linestring(linestring: &geo::LineString<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();

    if linestring.0.len() < 2 {
        result.add_error(
            "LineString".to_string(),
            format!("LineString must have at least 2 points, found {}", linestring.0.len()),
        );
        return result;
    }

    for (i, coord) in linestring.0.iter().enumerate() {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            result.add_error(format!("LineString[{i}]"), "Coordinates must be finite".to_string());
        }
    }

    result
}

fn validate_ring(ring: &geo::LineString<f64>, location: &str, result: &mut ValidationResult) {
    if ring.0.len() < 4 {
        result.add_error(
            location.to_string(),
            format!("Ring must have at least 4 points, found {}", ring.0.len()),
        );
    }
    if let (Some(first), Some(last)) = (ring.0.first(), ring.0.last()) {
        if first != last {
            result.add_error(
                location.to_string(),
                "Ring must be closed (first point == last point)".to_string(),
            );
        }
    }
    for (i, coord) in ring.0.iter().enumerate() {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            result.add_error(format!("{location}[{i}]"), "Coordinates must be finite".to_string());
        }
    }
}

fn validate_polygon(polygon: &geo::Polygon<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();
    validate_ring(polygon.exterior(), "Polygon exterior", &mut result);
    for (i, interior) in polygon.interiors().iter().enumerate() {
        validate_ring(interior, &format!("Polygon interior[{i}]"), &mut result);
    }
    result
}

fn validate_multipoint(multipoint: &geo::MultiPoint<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();
    for (i, point) in multipoint.0.iter().enumerate() {
        if !point.x().is_finite() || !point.y().is_finite() {
            result.add_error(format!("MultiPoint[{i}]"), "Coordinates must be finite".to_string());
        }
    }
    result
}

fn validate_multilinestring(multilinestring: &geo::MultiLineString<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();
    for (i, linestring) in multilinestring.0.iter().enumerate() {
        result.absorb(&format!("MultiLineString[{i}]"), validate_linestring(linestring));
    }
    result
}

fn validate_multipolygon(multipolygon: &geo::MultiPolygon<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();
    for (i, polygon) in multipolygon.0.iter().enumerate() {
        result.absorb(&format!("MultiPolygon[{i}]"), validate_polygon(polygon));
    }
    result
}


#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, point};

    #[test]
    fn finite_point_is_valid() {
        assert!(validate_geometry(&Geometry::Point(point! { x: 1.0, y: 2.0 })).is_valid);
        assert!(!validate_geometry(&Geometry::Point(point! { x: f64::NAN, y: 2.0 })).is_valid);
    }

    #[test]
    fn short_linestring_is_invalid() {
        let line: geo::LineString<f64> = vec![coord! { x: 0.0, y: 0.0 }].into();
        let result = validate_geometry(&Geometry::LineString(line));
        assert!(!result.is_valid);
        assert!(result.errors[0].reason.contains("at least 2"));
    }

    #[test]
    fn open_ring_is_invalid() {
        let ring: geo::LineString<f64> = vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
            coord! { x: 0.0, y: 1.0 },
        ]
        .into();
        let result = validate_geometry(&Geometry::Polygon(geo::Polygon::new(ring, vec![])));
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.reason.contains("closed")));
    }

    #[test]
    fn errors_carry_member_locations() {
        let good: geo::LineString<f64> =
            vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }].into();
        let bad: geo::LineString<f64> = vec![coord! { x: 0.0, y: 0.0 }].into();
        let result = validate_geometry(&Geometry::MultiLineString(geo::MultiLineString::new(
            vec![good, bad],
        )));
        assert!(!result.is_valid);
        assert!(result.errors[0].location.starts_with("MultiLineString[1]"));
    }
}
