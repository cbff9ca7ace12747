// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! The transformation core: matrix constructors for the editor's flip, rotate,
//! scale and shear tools, and atomic application of a transform to a node
//! subtree. A transform either applies to every touched node or to none.

use crate::{
    error::MapError,
    graph::MapGraph,
    node::{Node, NodeKind},
};
use redoubt_core::{
    algebra::{Matrix3, Matrix4, Point3, Rotation3, Unit, Vector3},
    math::{is_rigid, snap_to_integer, Bounds3},
};

/// Options threaded through every transform; linked-group propagation
/// overrides the UV lock on regardless of the user preference.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TransformOptions {
    pub uv_lock: bool,
}

/// A coordinate axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit(self) -> Vector3<f64> {
        match self {
            Axis::X => Vector3::x(),
            Axis::Y => Vector3::y(),
            Axis::Z => Vector3::z(),
        }
    }
}

/// Reflection along `axis` about the point `center`.
pub fn flip_matrix(axis: Axis, center: Vector3<f64>) -> Matrix4<f64> {
    let mut scale = Vector3::new(1.0, 1.0, 1.0);
    match axis {
        Axis::X => scale.x = -1.0,
        Axis::Y => scale.y = -1.0,
        Axis::Z => scale.z = -1.0,
    }
    Matrix4::new_translation(&center)
        * Matrix4::new_nonuniform_scaling(&scale)
        * Matrix4::new_translation(&-center)
}

/// Rotation of `angle` radians about the axis through `center`.
pub fn rotation_matrix(axis: Vector3<f64>, angle: f64, center: Vector3<f64>) -> Matrix4<f64> {
    Matrix4::new_translation(&center)
        * Matrix4::from_axis_angle(&Unit::new_normalize(axis), angle)
        * Matrix4::new_translation(&-center)
}

/// The affine map taking `source` onto `target`. A degenerate target extent is
/// rejected.
pub fn scale_bbox_matrix(source: Bounds3, target: Bounds3) -> Result<Matrix4<f64>, MapError> {
    if !source.is_valid() || source.is_degenerate(f64::EPSILON) {
        return Err(MapError::Geometry("scale source box is degenerate".to_owned()));
    }
    if !target.is_valid() || target.is_degenerate(f64::EPSILON) {
        return Err(MapError::Geometry("scale target box is degenerate".to_owned()));
    }
    let factors = target.size().component_div(&source.size());
    Ok(Matrix4::new_translation(&target.min)
        * Matrix4::new_nonuniform_scaling(&factors)
        * Matrix4::new_translation(&-source.min))
}

/// Shear that displaces points along `direction` proportionally to their
/// distance from the plane through the origin with the given normal.
pub fn shear_matrix(normal: Vector3<f64>, direction: Vector3<f64>) -> Matrix4<f64> {
    let linear = Matrix3::identity() + direction * normal.transpose();
    linear.to_homogeneous()
}

/// Computes the replacement payload for one node under the transform, or
/// `None` for variants that carry no own geometry. Does not mutate anything.
pub fn transformed_kind(
    node: &Node,
    m: &Matrix4<f64>,
    options: TransformOptions,
) -> Result<Option<NodeKind>, MapError> {
    if *m == Matrix4::identity() {
        return Ok(None);
    }
    match node.kind() {
        NodeKind::Brush(brush) => Ok(Some(NodeKind::Brush(
            brush.transformed(m, options.uv_lock)?,
        ))),
        NodeKind::Patch(patch) => Ok(Some(NodeKind::Patch(patch.transformed(m)))),
        NodeKind::Entity(entity) if entity.is_point_entity() => {
            let mut entity = entity.clone();
            if let Some(origin) = entity.origin() {
                let mapped = m.transform_point(&Point3::from(origin)).coords;
                let mapped = if is_rigid(m, 1e-9) {
                    snap_to_integer(mapped)
                } else {
                    mapped
                };
                entity.set_origin(mapped);
            }
            rotate_direction_properties(&mut entity, m);
            Ok(Some(NodeKind::Entity(entity)))
        }
        NodeKind::Group(group) => {
            let mut group = group.clone();
            group.prepend_transformation(m);
            Ok(Some(NodeKind::Group(group)))
        }
        _ => Ok(None),
    }
}

/// Applies a transform to a whole branch. All replacements are computed and
/// validated against the world bounds first; only then is anything written
/// back, so a failure leaves the graph untouched.
pub fn transform_subtree(
    graph: &mut MapGraph,
    root: redoubt_core::pool::Handle<Node>,
    m: &Matrix4<f64>,
    options: TransformOptions,
    world_bounds: Option<&Bounds3>,
) -> Result<(), MapError> {
    let handles: Vec<_> = graph.traverse(root).collect();
    let mut replacements = Vec::new();
    for &handle in &handles {
        if let Some(kind) = transformed_kind(&graph[handle], m, options)? {
            if let Some(world_bounds) = world_bounds {
                let bounds = kind_bounds(&kind);
                if bounds.is_valid() && !world_bounds.contains_bounds(&bounds) {
                    return Err(MapError::WorldBounds(format!(
                        "transform moves \"{}\" outside the world bounds",
                        graph[handle].name()
                    )));
                }
            }
            replacements.push((handle, kind));
        }
    }
    for (handle, kind) in replacements {
        graph[handle].replace_kind(kind);
        graph.invalidate_bounds_upward(handle);
    }
    Ok(())
}

/// Bounds of a payload that carries its own geometry.
fn kind_bounds(kind: &NodeKind) -> Bounds3 {
    match kind {
        NodeKind::Brush(brush) => brush.bounds(),
        NodeKind::Patch(patch) => patch.hull_bounds(),
        NodeKind::Entity(entity) => entity
            .origin()
            .map(Bounds3::from_point)
            .unwrap_or_default(),
        _ => Bounds3::default(),
    }
}

/// Updates the rotation-carrying properties `angle`, `angles` and `mangle`
/// under the rotational part of the transform.
fn rotate_direction_properties(entity: &mut crate::node::entity::Entity, m: &Matrix4<f64>) {
    let linear: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    if (linear - Matrix3::identity()).abs().max() < 1e-12 {
        return;
    }

    if let Some(angle) = entity
        .property("angle")
        .and_then(|v| v.trim().parse::<f64>().ok())
    {
        // Up/down sentinels of the quake dialects are left alone.
        if angle >= 0.0 || (angle != -1.0 && angle != -2.0) {
            let direction = yaw_direction(angle.to_radians());
            let rotated = linear * direction;
            if rotated.xy().norm() > 1e-9 {
                let new_angle = rotated.y.atan2(rotated.x).to_degrees();
                entity.set_property("angle", format_angle(new_angle));
            }
        }
    }

    for (key, yaw_first) in [("angles", false), ("mangle", true)] {
        let Some(components) = entity
            .property(key)
            .and_then(|v| crate::node::entity::parse_vec3(v))
        else {
            continue;
        };
        // `angles` is pitch/yaw/roll; `mangle` is yaw/pitch/roll.
        let (pitch, yaw, roll) = if yaw_first {
            (components.y, components.x, components.z)
        } else {
            (components.x, components.y, components.z)
        };
        let rotation = Rotation3::from_euler_angles(
            roll.to_radians(),
            -pitch.to_radians(),
            yaw.to_radians(),
        );
        let composed = Rotation3::from_matrix(&(linear * rotation.matrix()));
        let (new_roll, new_pitch, new_yaw) = composed.euler_angles();
        let (new_pitch, new_yaw, new_roll) = (
            -new_pitch.to_degrees(),
            new_yaw.to_degrees(),
            new_roll.to_degrees(),
        );
        let value = if yaw_first {
            Vector3::new(new_yaw, new_pitch, new_roll)
        } else {
            Vector3::new(new_pitch, new_yaw, new_roll)
        };
        entity.set_property(key, crate::node::entity::format_vec3(round_angles(value)));
    }
}

fn yaw_direction(yaw: f64) -> Vector3<f64> {
    Vector3::new(yaw.cos(), yaw.sin(), 0.0)
}

fn format_angle(degrees: f64) -> String {
    let normalized = degrees.rem_euclid(360.0);
    crate::node::entity::format_coord(round_angle(normalized))
}

fn round_angle(degrees: f64) -> f64 {
    let rounded = degrees.round();
    if (degrees - rounded).abs() < 1e-6 {
        rounded
    } else {
        degrees
    }
}

fn round_angles(v: Vector3<f64>) -> Vector3<f64> {
    Vector3::new(round_angle(v.x), round_angle(v.y), round_angle(v.z))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        brush::Brush,
        node::{entity::Entity, world::World},
    };

    #[test]
    fn flip_two_abutting_cubes() {
        // Flipping around the merged bounds center on X swaps the cubes.
        let a = Brush::cuboid(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(30.0, 31.0, 31.0),
            "m",
        )
        .unwrap();
        let b = Brush::cuboid(
            Vector3::new(30.0, 0.0, 0.0),
            Vector3::new(31.0, 31.0, 31.0),
            "m",
        )
        .unwrap();
        let center = a.bounds().merged(b.bounds()).center();
        let m = flip_matrix(Axis::X, center);

        let a_flipped = a.transformed(&m, false).unwrap();
        let b_flipped = b.transformed(&m, false).unwrap();
        assert_eq!(
            a_flipped.bounds(),
            Bounds3::from_min_max(Vector3::new(1.0, 0.0, 0.0), Vector3::new(31.0, 31.0, 31.0))
        );
        assert_eq!(
            b_flipped.bounds(),
            Bounds3::from_min_max(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 31.0, 31.0))
        );
    }

    #[test]
    fn rotation_stays_on_grid() {
        let brush = Brush::cuboid(
            Vector3::new(-16.0, -16.0, -16.0),
            Vector3::new(16.0, 16.0, 16.0),
            "m",
        )
        .unwrap();
        let m = rotation_matrix(
            Vector3::z(),
            std::f64::consts::FRAC_PI_2,
            Vector3::zeros(),
        );
        let rotated = brush.transformed(&m, false).unwrap();
        // A quarter turn of a centered cube maps it onto itself; the snap must
        // keep the vertices integral.
        assert_eq!(rotated.bounds(), brush.bounds());
        for vertex in rotated.vertices() {
            assert_eq!(*vertex, snap_to_integer(*vertex));
        }
    }

    #[test]
    fn scale_bbox_rejects_degenerate_target() {
        let source = Bounds3::from_radius(16.0);
        let flat = Bounds3::from_min_max(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(32.0, 32.0, 0.0),
        );
        assert!(scale_bbox_matrix(source, flat).is_err());

        let target = Bounds3::from_min_max(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(64.0, 32.0, 32.0),
        );
        let m = scale_bbox_matrix(source, target).unwrap();
        assert_eq!(source.transform(&m), target);
    }

    #[test]
    fn shear_displaces_along_direction() {
        let m = shear_matrix(Vector3::z(), Vector3::new(1.0, 0.0, 0.0));
        let p = m.transform_point(&Point3::new(0.0, 0.0, 2.0));
        assert_eq!(p.coords, Vector3::new(2.0, 0.0, 2.0));
        let q = m.transform_point(&Point3::new(5.0, 1.0, 0.0));
        assert_eq!(q.coords, Vector3::new(5.0, 1.0, 0.0));
    }

    #[test]
    fn point_entity_origin_and_angle() {
        let mut entity = Entity::with_classname("info_player_deathmatch");
        entity.set_property("origin", "64 0 0");
        entity.set_property("angle", "0");
        let node = Node::new(NodeKind::Entity(entity));

        let m = rotation_matrix(
            Vector3::z(),
            std::f64::consts::FRAC_PI_2,
            Vector3::zeros(),
        );
        let Some(NodeKind::Entity(rotated)) =
            transformed_kind(&node, &m, TransformOptions::default()).unwrap()
        else {
            panic!("expected an entity payload");
        };
        assert_eq!(rotated.property("origin"), Some("0 64 0"));
        assert_eq!(rotated.property("angle"), Some("90"));
    }

    #[test]
    fn angle_sentinels_survive_rotation() {
        let mut entity = Entity::with_classname("info_player_start");
        entity.set_property("origin", "0 0 0");
        entity.set_property("angle", "-1");
        let node = Node::new(NodeKind::Entity(entity));
        let m = rotation_matrix(Vector3::z(), 1.0, Vector3::zeros());
        let Some(NodeKind::Entity(rotated)) =
            transformed_kind(&node, &m, TransformOptions::default()).unwrap()
        else {
            panic!("expected an entity payload");
        };
        assert_eq!(rotated.property("angle"), Some("-1"));
    }

    #[test]
    fn transform_subtree_is_atomic_on_bounds_failure() {
        let mut graph = MapGraph::new(World::default());
        let layer = graph.default_layer();
        let near = graph
            .add_node(
                Node::new(NodeKind::Brush(
                    Brush::cuboid(
                        Vector3::new(0.0, 0.0, 0.0),
                        Vector3::new(32.0, 32.0, 32.0),
                        "m",
                    )
                    .unwrap(),
                )),
                layer,
            )
            .unwrap();
        let far = graph
            .add_node(
                Node::new(NodeKind::Brush(
                    Brush::cuboid(
                        Vector3::new(8100.0, 0.0, 0.0),
                        Vector3::new(8150.0, 32.0, 32.0),
                        "m",
                    )
                    .unwrap(),
                )),
                layer,
            )
            .unwrap();

        let world_bounds = graph[graph.root()].as_world().bounds();
        let m = Matrix4::new_translation(&Vector3::new(100.0, 0.0, 0.0));
        let result = transform_subtree(
            &mut graph,
            layer,
            &m,
            TransformOptions::default(),
            Some(&world_bounds),
        );
        assert!(matches!(result, Err(MapError::WorldBounds(_))));
        // Nothing moved.
        assert_eq!(
            graph.logical_bounds(near).min,
            Vector3::new(0.0, 0.0, 0.0)
        );
        assert_eq!(
            graph.logical_bounds(far).max,
            Vector3::new(8150.0, 32.0, 32.0)
        );
    }
}
