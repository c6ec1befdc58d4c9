//! Surface materials and the pairwise contact-material table.

use alloc::collections::BTreeMap;
use alloc::string::String;
use core::sync::atomic::{AtomicU32, Ordering};

static NEXT_MATERIAL_ID: AtomicU32 = AtomicU32::new(1);

/// A named surface. Friction and restitution are optional per-material
/// overrides; when both bodies of a contact set one, their product is used.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    id: u32,
    pub name: String,
    pub friction: Option<f32>,
    pub restitution: Option<f32>,
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            id: NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed),
            name: String::from(name),
            friction: None,
            restitution: None,
        }
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = Some(friction.max(0.0));
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = Some(restitution.clamp(0.0, 1.0));
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

/// How two materials behave when they touch.
///
/// The stiffness/relaxation pairs are turned into Spook parameters for every
/// equation at the current timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContactMaterial {
    /// Ids of the two materials (order does not matter). `(0, 0)` for the default.
    pub materials: (u32, u32),
    pub friction: f32,
    pub restitution: f32,
    pub contact_equation_stiffness: f32,
    pub contact_equation_relaxation: f32,
    pub friction_equation_stiffness: f32,
    pub friction_equation_relaxation: f32,
}

impl Default for ContactMaterial {
    fn default() -> Self {
        Self {
            materials: (0, 0),
            friction: 0.3,
            restitution: 0.0,
            contact_equation_stiffness: 1e7,
            contact_equation_relaxation: 3.0,
            friction_equation_stiffness: 1e7,
            friction_equation_relaxation: 3.0,
        }
    }
}

impl ContactMaterial {
    /// Contact behaviour between materials `a` and `b` with default solver tuning.
    pub fn new(a: &Material, b: &Material, friction: f32, restitution: f32) -> Self {
        Self {
            materials: (a.id, b.id),
            friction: friction.max(0.0),
            restitution: restitution.clamp(0.0, 1.0),
            ..Self::default()
        }
    }

    pub fn with_contact_stiffness(mut self, stiffness: f32, relaxation: f32) -> Self {
        self.contact_equation_stiffness = stiffness;
        self.contact_equation_relaxation = relaxation;
        self
    }

    pub fn with_friction_stiffness(mut self, stiffness: f32, relaxation: f32) -> Self {
        self.friction_equation_stiffness = stiffness;
        self.friction_equation_relaxation = relaxation;
        self
    }
}

fn pair_key(a: u32, b: u32) -> (u32, u32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Lookup of [`ContactMaterial`]s keyed by an unordered pair of material ids.
#[derive(Debug, Default, Clone)]
pub struct ContactMaterialTable {
    entries: BTreeMap<(u32, u32), ContactMaterial>,
}

impl ContactMaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for the material pair of `cm`.
    pub fn insert(&mut self, cm: ContactMaterial) {
        self.entries.insert(pair_key(cm.materials.0, cm.materials.1), cm);
    }

    pub fn get(&self, a: u32, b: u32) -> Option<&ContactMaterial> {
        self.entries.get(&pair_key(a, b))
    }

    pub fn remove(&mut self, a: u32, b: u32) -> Option<ContactMaterial> {
        self.entries.remove(&pair_key(a, b))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Friction and restitution for a contact between two bodies.
///
/// A table entry wins; otherwise `default` is used, with the product of the
/// two per-material values taking over when both materials define one.
pub fn resolve_contact_material(
    table: &ContactMaterialTable,
    default: &ContactMaterial,
    a: Option<&Material>,
    b: Option<&Material>,
) -> ContactMaterial {
    let (ma, mb) = match (a, b) {
        (Some(ma), Some(mb)) => (ma, mb),
        _ => return *default,
    };
    if let Some(cm) = table.get(ma.id, mb.id) {
        return *cm;
    }
    let mut cm = *default;
    if let (Some(fa), Some(fb)) = (ma.friction, mb.friction) {
        cm.friction = fa * fb;
    }
    if let (Some(ra), Some(rb)) = (ma.restitution, mb.restitution) {
        cm.restitution = ra * rb;
    }
    cm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_ids_are_unique() {
        let a = Material::new("ice");
        let b = Material::new("ice");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_table_lookup_is_unordered() {
        let ice = Material::new("ice");
        let rubber = Material::new("rubber");
        let mut table = ContactMaterialTable::new();
        table.insert(ContactMaterial::new(&ice, &rubber, 0.05, 0.2));
        assert_eq!(table.len(), 1);
        let ab = table.get(ice.id(), rubber.id()).copied();
        let ba = table.get(rubber.id(), ice.id()).copied();
        assert_eq!(ab, ba);
        assert!(ab.is_some());
    }

    #[test]
    fn test_missing_pair_falls_back_to_default() {
        let table = ContactMaterialTable::new();
        let default = ContactMaterial::default();
        let a = Material::new("wood");
        let b = Material::new("stone");
        let cm = resolve_contact_material(&table, &default, Some(&a), Some(&b));
        assert_eq!(cm, default);
        let cm = resolve_contact_material(&table, &default, None, Some(&b));
        assert_eq!(cm, default);
    }

    #[test]
    fn test_per_material_values_multiply() {
        let table = ContactMaterialTable::new();
        let default = ContactMaterial::default();
        let a = Material::new("a").with_friction(0.5).with_restitution(0.8);
        let b = Material::new("b").with_friction(0.4).with_restitution(0.5);
        let cm = resolve_contact_material(&table, &default, Some(&a), Some(&b));
        assert!((cm.friction - 0.2).abs() < 1e-6);
        assert!((cm.restitution - 0.4).abs() < 1e-6);
        assert_eq!(cm.contact_equation_stiffness, default.contact_equation_stiffness);
    }
}
