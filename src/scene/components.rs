// src/scene/components.rs
//! Attachable entity components.
//!
//! The set of component kinds is closed per application, so dispatch is an
//! explicit enum rather than runtime type inspection. An entity carries at
//! most one component of each kind.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// What a light emits and in which shape.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    Directional { direction: Vec3 },
    Point { range: f32 },
    Spot { direction: Vec3, angle: f32 },
}

/// A light attached to an entity. Position comes from the entity's world
/// transform; directional/spot directions are rotated by it.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    pub cast_shadows: bool,
}

impl Light {
    pub fn directional(direction: Vec3) -> Self {
        Self {
            kind: LightKind::Directional {
                direction: direction.normalize_or_zero(),
            },
            color: Vec3::ONE,
            intensity: 1.0,
            cast_shadows: true,
        }
    }

    pub fn point(range: f32) -> Self {
        Self {
            kind: LightKind::Point { range },
            color: Vec3::ONE,
            intensity: 1.0,
            cast_shadows: false,
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn with_shadows(mut self, cast: bool) -> Self {
        self.cast_shadows = cast;
        self
    }
}

/// Distance window in which the entity is drawn at all.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodRange {
    pub min_distance: f32,
    pub max_distance: f32,
}

/// Discriminant for component lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Light,
    LodRange,
}

/// Closed component sum type.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Component {
    Light(Light),
    LodRange(LodRange),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Light(_) => ComponentKind::Light,
            Component::LodRange(_) => ComponentKind::LodRange,
        }
    }

    pub fn as_light(&self) -> Option<&Light> {
        match self {
            Component::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_lod_range(&self) -> Option<&LodRange> {
        match self {
            Component::LodRange(range) => Some(range),
            _ => None,
        }
    }
}
