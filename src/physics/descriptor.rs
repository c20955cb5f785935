//! Physics component to simulation body descriptors

use glam::{Mat4, Quat, Vec3};
use rapier3d::prelude::*;

use super::world::isometry;
use crate::components::{BodyKind, GeometryKind, GeometryProps, PhysicsProps};

/// Thickness given to plane colliders
const PLANE_HALF_THICKNESS: f32 = 0.01;

/// Collider shape, already scaled to world size
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    Cuboid { half_extents: Vec3 },
    Ball { radius: f32 },
    Cylinder { half_height: f32, radius: f32 },
    Cone { half_height: f32, radius: f32 },
    Capsule { half_height: f32, radius: f32 },
}

impl ColliderShape {
    /// Unit cube used when a node has no usable geometry
    pub const FALLBACK: ColliderShape = ColliderShape::Cuboid {
        half_extents: Vec3::splat(0.5),
    };

    /// Shape matching a geometry under the given world scale
    #[must_use]
    pub fn from_geometry(geometry: &GeometryProps, scale: Vec3) -> Self {
        let scale = scale.abs();
        let radial = scale.x.max(scale.z);
        match geometry.kind {
            GeometryKind::Box => Self::Cuboid {
                half_extents: geometry.half_extents() * scale,
            },
            GeometryKind::Plane => {
                let half = geometry.half_extents() * scale;
                Self::Cuboid {
                    half_extents: Vec3::new(half.x, half.y, PLANE_HALF_THICKNESS),
                }
            }
            GeometryKind::Sphere => Self::Ball {
                radius: geometry.arg(0, 1.0) * scale.max_element(),
            },
            GeometryKind::Cylinder => Self::Cylinder {
                half_height: geometry.arg(2, 1.0) / 2.0 * scale.y,
                radius: geometry.arg(0, 1.0).max(geometry.arg(1, 1.0)) * radial,
            },
            GeometryKind::Cone => Self::Cone {
                half_height: geometry.arg(1, 1.0) / 2.0 * scale.y,
                radius: geometry.arg(0, 1.0) * radial,
            },
            GeometryKind::Capsule => Self::Capsule {
                half_height: geometry.arg(1, 1.0) / 2.0 * scale.y,
                radius: geometry.arg(0, 1.0) * radial,
            },
        }
    }

    /// Fallback cube under the given world scale
    #[must_use]
    pub fn fallback(scale: Vec3) -> Self {
        Self::Cuboid {
            half_extents: Vec3::splat(0.5) * scale.abs(),
        }
    }

    fn builder(&self) -> ColliderBuilder {
        match *self {
            Self::Cuboid { half_extents: h } => ColliderBuilder::cuboid(h.x, h.y, h.z),
            Self::Ball { radius } => ColliderBuilder::ball(radius),
            Self::Cylinder {
                half_height,
                radius,
            } => ColliderBuilder::cylinder(half_height, radius),
            Self::Cone {
                half_height,
                radius,
            } => ColliderBuilder::cone(half_height, radius),
            Self::Capsule {
                half_height,
                radius,
            } => ColliderBuilder::capsule_y(half_height, radius),
        }
    }
}

/// Unpack 32-bit groups: high 16 bits memberships, low 16 bits filter
#[must_use]
pub fn interaction_groups(packed: u32) -> InteractionGroups {
    InteractionGroups::new(
        Group::from_bits_truncate(packed >> 16),
        Group::from_bits_truncate(packed & 0xffff),
    )
}

/// Everything needed to create the simulation body of one node
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDescriptor {
    pub props: PhysicsProps,
    pub shape: ColliderShape,
    pub position: Vec3,
    pub rotation: Quat,
}

impl BodyDescriptor {
    /// Describe a node from its physics props, world matrix and geometry
    #[must_use]
    pub fn new(props: &PhysicsProps, world: Mat4, geometry: Option<&GeometryProps>) -> Self {
        let (scale, rotation, position) = world.to_scale_rotation_translation();
        let shape = match geometry {
            Some(geometry) => ColliderShape::from_geometry(geometry, scale),
            None => ColliderShape::fallback(scale),
        };
        Self {
            props: props.clone(),
            shape,
            position,
            rotation,
        }
    }

    /// Body kind
    #[must_use]
    pub fn kind(&self) -> BodyKind {
        self.props.kind
    }

    /// Check if only the pose differs from `other`
    #[must_use]
    pub fn same_body(&self, other: &Self) -> bool {
        self.props == other.props && self.shape == other.shape
    }

    /// Rigid body for the simulation
    #[must_use]
    pub fn rigid_body(&self) -> RigidBody {
        let p = &self.props;
        let builder = match p.kind {
            BodyKind::Fixed => RigidBodyBuilder::fixed(),
            BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
            BodyKind::KinematicPosition => RigidBodyBuilder::kinematic_position_based(),
            BodyKind::KinematicVelocity => RigidBodyBuilder::kinematic_velocity_based(),
        };
        let [tx, ty, tz] = p.enabled_translations;
        let [rx, ry, rz] = p.enabled_rotations;
        builder
            .position(isometry(self.position, self.rotation))
            .linear_damping(p.linear_damping)
            .angular_damping(p.angular_damping)
            .gravity_scale(p.gravity_scale)
            .ccd_enabled(p.ccd)
            .enabled_translations(tx, ty, tz)
            .enabled_rotations(rx, ry, rz)
            .build()
    }

    /// Collider attached to the body
    #[must_use]
    pub fn collider(&self) -> Collider {
        let p = &self.props;
        let mut builder = self
            .shape
            .builder()
            .restitution(p.restitution)
            .friction(p.friction)
            .sensor(p.sensor)
            .active_events(ActiveEvents::COLLISION_EVENTS);
        if p.sensor {
            // let fixed sensors see kinematic bodies too
            builder = builder
                .active_collision_types(ActiveCollisionTypes::default() | ActiveCollisionTypes::KINEMATIC_FIXED);
        }
        if let Some(mass) = p.mass {
            builder = builder.mass(mass);
        }
        if let Some(groups) = p.collision_groups {
            builder = builder.collision_groups(interaction_groups(groups));
        }
        if let Some(groups) = p.solver_groups {
            builder = builder.solver_groups(interaction_groups(groups));
        }
        builder.build()
    }
}
