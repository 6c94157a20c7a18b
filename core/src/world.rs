//! World: indexed collection of maps by `map_no` (spec §3).

use std::collections::HashMap;

use crate::error::{ErrorKind, MapError, PokError};
use crate::map::Map;

#[derive(Default)]
pub struct World {
    maps: HashMap<u32, Map>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, map: Map) -> Result<(), PokError> {
        let no = map.map_no;
        if self.maps.insert(no, map).is_some() {
            return Err(PokError::new(
                ErrorKind::Map(MapError::AlreadyLoaded),
                format!("map {no} already loaded"),
            ));
        }
        Ok(())
    }

    pub fn get(&self, map_no: u32) -> Option<&Map> {
        self.maps.get(&map_no)
    }

    pub fn get_mut(&mut self, map_no: u32) -> Option<&mut Map> {
        self.maps.get_mut(&map_no)
    }

    pub fn remove(&mut self, map_no: u32) -> Option<Map> {
        self.maps.remove(&map_no)
    }

    pub fn contains(&self, map_no: u32) -> bool {
        self.maps.contains_key(&map_no)
    }
}
