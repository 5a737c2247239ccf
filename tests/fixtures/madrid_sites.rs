//! Inspection sites around Madrid for realistic fixtures.
//!
//! Coordinates are approximate public landmarks; zone ids follow the
//! four districts built by [`super::madrid_zones`].

use inspection_dispatch::models::{Coordinate, ZoneId};

pub const CENTRO: ZoneId = 1;
pub const NORTE: ZoneId = 2;
pub const SUR: ZoneId = 3;
pub const ESTE: ZoneId = 4;

/// A named inspection site.
#[derive(Debug, Clone)]
pub struct Site {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
    pub zone_id: ZoneId,
}

impl Site {
    pub const fn new(name: &'static str, lat: f64, lng: f64, zone_id: ZoneId) -> Self {
        Self {
            name,
            lat,
            lng,
            zone_id,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
            .with_zone(self.zone_id)
            .with_address(self.name)
    }

    /// Same position without a zone, for detector tests.
    pub fn unzoned(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng).with_address(self.name)
    }
}

pub const CENTRO_SITES: &[Site] = &[
    Site::new("Puerta del Sol", 40.4169, -3.7035, CENTRO),
    Site::new("Plaza Mayor", 40.4155, -3.7074, CENTRO),
    Site::new("Mercado de San Miguel", 40.4154, -3.7090, CENTRO),
    Site::new("Plaza de Callao", 40.4199, -3.7058, CENTRO),
    Site::new("Teatro Real", 40.4183, -3.7110, CENTRO),
    Site::new("Plaza de Cibeles", 40.4193, -3.6932, CENTRO),
];

pub const NORTE_SITES: &[Site] = &[
    Site::new("Estadio Santiago Bernabeu", 40.4531, -3.6883, NORTE),
    Site::new("Estacion de Chamartin", 40.4722, -3.6825, NORTE),
    Site::new("Plaza de Castilla", 40.4669, -3.6890, NORTE),
    Site::new("Hospital La Paz", 40.4810, -3.6870, NORTE),
];

pub const SUR_SITES: &[Site] = &[
    Site::new("Estacion de Atocha", 40.4066, -3.6892, SUR),
    Site::new("Matadero Madrid", 40.3920, -3.6980, SUR),
    Site::new("Plaza de Legazpi", 40.3910, -3.6952, SUR),
    Site::new("Getafe Centro", 40.3057, -3.7329, SUR),
];

pub const ESTE_SITES: &[Site] = &[
    Site::new("Parque del Retiro", 40.4153, -3.6845, ESTE),
    Site::new("Plaza de toros Las Ventas", 40.4320, -3.6630, ESTE),
    Site::new("Aeropuerto Barajas T4", 40.4915, -3.5935, ESTE),
    Site::new("Alcala de Henares", 40.4818, -3.3645, ESTE),
];

/// Zigzag through Centro: the listed order doubles back on itself.
pub fn centro_zigzag() -> Vec<Coordinate> {
    [0, 5, 1, 3, 2, 4]
        .iter()
        .map(|&i| CENTRO_SITES[i].coordinate())
        .collect()
}

pub fn all_sites() -> Vec<&'static Site> {
    CENTRO_SITES
        .iter()
        .chain(NORTE_SITES)
        .chain(SUR_SITES)
        .chain(ESTE_SITES)
        .collect()
}
