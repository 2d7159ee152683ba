use std::collections::HashMap;

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitDefId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CityStateDefId(pub u32);

/// Base stats for one unit type.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDef {
    pub id: UnitDefId,
    pub def_name: String,
    pub label: String,
    pub model: String,
    pub scale: f32,
    pub damage: u32,
    pub health: u32,
    pub speed: f32,
    pub ranged: bool,
    pub attack_range: f32,
    /// Fraction of the attack animation at which damage lands.
    pub attack_trigger: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CityStateDef {
    pub id: CityStateDefId,
    pub def_name: String,
    pub label: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub renown: u32,
    pub garrison: u32,
    pub description: String,
}

#[derive(Debug, Default, Clone)]
pub struct DefDatabase {
    unit_defs: Vec<UnitDef>,
    unit_ids_by_name: HashMap<String, UnitDefId>,
    city_state_defs: Vec<CityStateDef>,
    city_state_ids_by_name: HashMap<String, CityStateDefId>,
    names: Vec<String>,
}

impl DefDatabase {
    /// Assigns ids in the order given. Later defs with a repeated name replace
    /// the lookup entry.
    pub fn new(
        mut unit_defs: Vec<UnitDef>,
        mut city_state_defs: Vec<CityStateDef>,
        names: Vec<String>,
    ) -> Self {
        let mut unit_ids_by_name = HashMap::with_capacity(unit_defs.len());
        for (idx, def) in unit_defs.iter_mut().enumerate() {
            def.id = UnitDefId(idx as u32);
            unit_ids_by_name.insert(def.def_name.clone(), def.id);
        }
        let mut city_state_ids_by_name = HashMap::with_capacity(city_state_defs.len());
        for (idx, def) in city_state_defs.iter_mut().enumerate() {
            def.id = CityStateDefId(idx as u32);
            city_state_ids_by_name.insert(def.def_name.clone(), def.id);
        }
        Self {
            unit_defs,
            unit_ids_by_name,
            city_state_defs,
            city_state_ids_by_name,
            names,
        }
    }

    pub fn unit_def_by_name(&self, name: &str) -> Option<&UnitDef> {
        self.unit_ids_by_name
            .get(name)
            .and_then(|id| self.unit_def(*id))
    }

    pub fn unit_def(&self, id: UnitDefId) -> Option<&UnitDef> {
        self.unit_defs.get(id.0 as usize)
    }

    pub fn unit_defs(&self) -> &[UnitDef] {
        &self.unit_defs
    }

    pub fn city_state_def_by_name(&self, name: &str) -> Option<&CityStateDef> {
        self.city_state_ids_by_name
            .get(name)
            .and_then(|id| self.city_state_defs.get(id.0 as usize))
    }

    pub fn city_state_defs(&self) -> &[CityStateDef] {
        &self.city_state_defs
    }

    /// Personal names available for newly raised units.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}
