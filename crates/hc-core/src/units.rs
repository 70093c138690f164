// hc-core/src/units.rs
//
// Runtime unit registry. Observation files carry units as free text
// ("m3/s", "L/s", "cfs", "kg m-2 s-1"), so conversion has to be resolved
// from strings. Registered symbols are looked up directly; anything else is
// parsed as a product of powers of registered symbols. The conversion
// factors themselves come from uom so they stay in sync with the SI
// definitions used elsewhere.

use std::collections::HashMap;
use std::fmt;

use uom::si::f64::{
    Area, Length, Mass, MassRate, Pressure, Ratio, ThermodynamicTemperature, Time, Velocity,
    Volume, VolumeRate,
};

use crate::{CoreError, CoreResult};

/// Physical dimension of a registered unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dimension {
    Dimensionless,
    Length,
    Area,
    Volume,
    Time,
    VolumeRate,
    Velocity,
    Temperature,
    Pressure,
    Mass,
    MassRate,
    MassFlux,
    /// Any other product of length, mass and time powers.
    Derived { length: i32, mass: i32, time: i32 },
}

impl Dimension {
    /// `(length, mass, time)` exponents. Temperature has none because
    /// offset units cannot be multiplied.
    pub fn exponents(self) -> Option<[i32; 3]> {
        Some(match self {
            Self::Dimensionless => [0, 0, 0],
            Self::Length => [1, 0, 0],
            Self::Area => [2, 0, 0],
            Self::Volume => [3, 0, 0],
            Self::Time => [0, 0, 1],
            Self::VolumeRate => [3, 0, -1],
            Self::Velocity => [1, 0, -1],
            Self::Pressure => [-1, 1, -2],
            Self::Mass => [0, 1, 0],
            Self::MassRate => [0, 1, -1],
            Self::MassFlux => [-2, 1, -1],
            Self::Temperature => return None,
            Self::Derived { length, mass, time } => [length, mass, time],
        })
    }

    /// Named dimension for `exponents`, or `Derived` when none matches.
    pub fn from_exponents(exponents: [i32; 3]) -> Self {
        const NAMED: [Dimension; 11] = [
            Dimension::Dimensionless,
            Dimension::Length,
            Dimension::Area,
            Dimension::Volume,
            Dimension::Time,
            Dimension::VolumeRate,
            Dimension::Velocity,
            Dimension::Pressure,
            Dimension::Mass,
            Dimension::MassRate,
            Dimension::MassFlux,
        ];
        NAMED
            .into_iter()
            .find(|d| d.exponents() == Some(exponents))
            .unwrap_or(Self::Derived {
                length: exponents[0],
                mass: exponents[1],
                time: exponents[2],
            })
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dimensionless => write!(f, "dimensionless"),
            Self::Length => write!(f, "length"),
            Self::Area => write!(f, "area"),
            Self::Volume => write!(f, "volume"),
            Self::Time => write!(f, "time"),
            Self::VolumeRate => write!(f, "volume rate"),
            Self::Velocity => write!(f, "velocity"),
            Self::Temperature => write!(f, "temperature"),
            Self::Pressure => write!(f, "pressure"),
            Self::Mass => write!(f, "mass"),
            Self::MassRate => write!(f, "mass rate"),
            Self::MassFlux => write!(f, "mass flux"),
            Self::Derived { length, mass, time } => {
                let parts: Vec<String> = [("L", length), ("M", mass), ("T", time)]
                    .into_iter()
                    .filter(|(_, p)| **p != 0)
                    .map(|(s, p)| if *p == 1 { s.to_string() } else { format!("{s}^{p}") })
                    .collect();
                write!(f, "{}", parts.join(" "))
            }
        }
    }
}

/// A unit expressed against the SI base unit of its dimension:
/// `si = value * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitDef {
    pub dimension: Dimension,
    pub scale: f64,
    pub offset: f64,
}

impl UnitDef {
    pub const fn linear(dimension: Dimension, scale: f64) -> Self {
        Self {
            dimension,
            scale,
            offset: 0.0,
        }
    }
}

/// Affine map between two compatible units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Conversion {
    pub scale: f64,
    pub offset: f64,
}

impl Conversion {
    pub const IDENTITY: Conversion = Conversion {
        scale: 1.0,
        offset: 0.0,
    };

    #[inline]
    pub fn apply(self, v: f64) -> f64 {
        v * self.scale + self.offset
    }

    pub fn is_identity(self) -> bool {
        self.scale == 1.0 && self.offset == 0.0
    }
}

/// Registry of known unit strings.
///
/// There is no process-wide instance: callers construct one (usually with
/// [`UnitRegistry::with_defaults`]) and pass it to every conversion.
#[derive(Clone, Debug)]
pub struct UnitRegistry {
    units: HashMap<String, UnitDef>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl UnitRegistry {
    /// Registry with no units at all.
    pub fn empty() -> Self {
        Self {
            units: HashMap::new(),
        }
    }

    /// Registry preloaded with the hydrological units used by observation
    /// and model output files.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for (symbols, def) in builtin_units() {
            for symbol in symbols {
                registry.define(symbol, def);
            }
        }
        registry
    }

    /// Register (or replace) a unit symbol.
    pub fn define(&mut self, symbol: &str, def: UnitDef) {
        self.units.insert(normalize(symbol), def);
    }

    /// Register `alias` as another spelling of an existing unit.
    pub fn alias(&mut self, alias: &str, existing: &str) -> CoreResult<()> {
        let def = self.lookup(existing)?;
        self.define(alias, def);
        Ok(())
    }

    /// Whether `unit` is registered or composed of registered symbols.
    pub fn contains(&self, unit: &str) -> bool {
        self.lookup(unit).is_ok()
    }

    pub fn lookup(&self, unit: &str) -> CoreResult<UnitDef> {
        let key = normalize(unit);
        if let Some(def) = self.units.get(&key) {
            return Ok(*def);
        }
        self.compound(&key).ok_or_else(|| CoreError::UnknownUnit {
            unit: unit.to_string(),
        })
    }

    /// Parse `kg m-2 s-1`, `kg/m2/s` or `g*m-2/d`: factors separated by
    /// spaces or `*`, each a registered symbol with an optional integer
    /// power, and every `/` dividing by the factors after it.
    fn compound(&self, unit: &str) -> Option<UnitDef> {
        let mut exponents = [0_i32; 3];
        let mut scale = 1.0;
        let mut factors = 0;
        for (i, part) in unit.split('/').enumerate() {
            let sign = if i == 0 { 1 } else { -1 };
            for token in part.split(|c: char| c.is_whitespace() || c == '*').filter(|t| !t.is_empty()) {
                let (def, power) = match self.units.get(token) {
                    Some(def) => (*def, 1),
                    None => {
                        let (symbol, power) = split_power(token)?;
                        (*self.units.get(symbol)?, power)
                    }
                };
                if def.offset != 0.0 {
                    return None;
                }
                let power = sign * power;
                for (e, d) in exponents.iter_mut().zip(def.dimension.exponents()?) {
                    *e += d * power;
                }
                scale *= def.scale.powi(power);
                factors += 1;
            }
        }
        (factors > 0).then(|| UnitDef::linear(Dimension::from_exponents(exponents), scale))
    }

    pub fn dimension(&self, unit: &str) -> CoreResult<Dimension> {
        Ok(self.lookup(unit)?.dimension)
    }

    pub fn is_compatible(&self, a: &str, b: &str) -> CoreResult<bool> {
        Ok(self.dimension(a)? == self.dimension(b)?)
    }

    /// Affine map taking values in `from` to values in `to`.
    pub fn conversion(&self, from: &str, to: &str) -> CoreResult<Conversion> {
        let src = self.lookup(from)?;
        let dst = self.lookup(to)?;
        if src.dimension != dst.dimension {
            return Err(CoreError::IncompatibleUnits {
                from: from.to_string(),
                to: to.to_string(),
                from_dim: src.dimension.to_string(),
                to_dim: dst.dimension.to_string(),
            });
        }
        if src == dst {
            return Ok(Conversion::IDENTITY);
        }
        Ok(Conversion {
            scale: src.scale / dst.scale,
            offset: (src.offset - dst.offset) / dst.scale,
        })
    }

    pub fn convert(&self, value: f64, from: &str, to: &str) -> CoreResult<f64> {
        Ok(self.conversion(from, to)?.apply(value))
    }

    /// Convert a slice in place. NaN cells stay NaN.
    pub fn convert_slice(&self, values: &mut [f64], from: &str, to: &str) -> CoreResult<()> {
        let conv = self.conversion(from, to)?;
        if conv.is_identity() {
            return Ok(());
        }
        for v in values.iter_mut() {
            *v = conv.apply(*v);
        }
        Ok(())
    }
}

/// Canonical spelling used as the registry key: trimmed, with exponent
/// markers dropped (`m^3/s` and `m**3/s` both become `m3/s`).
fn normalize(unit: &str) -> String {
    unit.trim().replace("**", "").replace('^', "")
}

/// Split a trailing integer power off a factor: `m-2` is `("m", -2)`.
fn split_power(token: &str) -> Option<(&str, i32)> {
    let digits = token.len() - token.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let mut cut = token.len() - digits;
    if token[..cut].ends_with(['-', '+']) {
        cut -= 1;
    }
    let symbol = &token[..cut];
    if symbol.is_empty() {
        return None;
    }
    Some((symbol, token[cut..].parse().ok()?))
}

fn builtin_units() -> Vec<(&'static [&'static str], UnitDef)> {
    use uom::si::area::{acre, hectare, square_foot, square_kilometer, square_meter, square_mile};
    use uom::si::length::{centimeter, foot, inch, kilometer, meter, mile, millimeter};
    use uom::si::mass::{gram, kilogram};
    use uom::si::mass_rate::kilogram_per_second;
    use uom::si::pressure::{bar, hectopascal, kilopascal, pascal};
    use uom::si::ratio::{percent, ratio};
    use uom::si::thermodynamic_temperature::{degree_celsius, degree_fahrenheit, kelvin};
    use uom::si::time::{day, hour, minute, second};
    use uom::si::velocity::meter_per_second;
    use uom::si::volume::{acre_foot, cubic_foot, cubic_meter, liter};
    use uom::si::volume_rate::{cubic_foot_per_second, cubic_meter_per_second, liter_per_second};

    let len = |l: Length| UnitDef::linear(Dimension::Length, l.get::<meter>());
    let area = |a: Area| UnitDef::linear(Dimension::Area, a.get::<square_meter>());
    let vol = |v: Volume| UnitDef::linear(Dimension::Volume, v.get::<cubic_meter>());
    let time = |t: Time| UnitDef::linear(Dimension::Time, t.get::<second>());
    let flow = |q: VolumeRate| UnitDef::linear(Dimension::VolumeRate, q.get::<cubic_meter_per_second>());
    let speed = |v: Velocity| UnitDef::linear(Dimension::Velocity, v.get::<meter_per_second>());
    let pres = |p: Pressure| UnitDef::linear(Dimension::Pressure, p.get::<pascal>());
    let mass = |m: Mass| UnitDef::linear(Dimension::Mass, m.get::<kilogram>());
    let temp = |at_zero: ThermodynamicTemperature, at_one: ThermodynamicTemperature| UnitDef {
        dimension: Dimension::Temperature,
        scale: at_one.get::<kelvin>() - at_zero.get::<kelvin>(),
        offset: at_zero.get::<kelvin>(),
    };

    let one_day = Time::new::<day>(1.0);
    let one_hour = Time::new::<hour>(1.0);
    let one_second = Time::new::<second>(1.0);

    vec![
        (
            &["1", "-", "dimensionless", "unitless", "fraction"][..],
            UnitDef::linear(Dimension::Dimensionless, Ratio::new::<ratio>(1.0).get::<ratio>()),
        ),
        (
            &["%", "percent"][..],
            UnitDef::linear(Dimension::Dimensionless, Ratio::new::<percent>(1.0).get::<ratio>()),
        ),
        // length
        (&["m", "meter", "metre"][..], len(Length::new::<meter>(1.0))),
        (&["mm", "millimeter", "millimetre"][..], len(Length::new::<millimeter>(1.0))),
        (&["cm", "centimeter", "centimetre"][..], len(Length::new::<centimeter>(1.0))),
        (&["km", "kilometer", "kilometre"][..], len(Length::new::<kilometer>(1.0))),
        (&["ft", "foot", "feet"][..], len(Length::new::<foot>(1.0))),
        (&["in", "inch"][..], len(Length::new::<inch>(1.0))),
        (&["mi", "mile"][..], len(Length::new::<mile>(1.0))),
        // area
        (&["m2", "square_meter"][..], area(Area::new::<square_meter>(1.0))),
        (&["km2", "square_kilometer"][..], area(Area::new::<square_kilometer>(1.0))),
        (&["ha", "hectare"][..], area(Area::new::<hectare>(1.0))),
        (&["ft2", "square_foot"][..], area(Area::new::<square_foot>(1.0))),
        (&["acre"][..], area(Area::new::<acre>(1.0))),
        (&["mi2", "square_mile"][..], area(Area::new::<square_mile>(1.0))),
        // volume
        (&["m3", "cubic_meter"][..], vol(Volume::new::<cubic_meter>(1.0))),
        (&["L", "l", "liter", "litre"][..], vol(Volume::new::<liter>(1.0))),
        (&["ML", "megaliter"][..], vol(Volume::new::<liter>(1.0e6))),
        (&["dam3"][..], vol(Volume::new::<cubic_meter>(1.0e3))),
        (&["ft3", "cubic_foot"][..], vol(Volume::new::<cubic_foot>(1.0))),
        (&["acre-ft", "acre_foot"][..], vol(Volume::new::<acre_foot>(1.0))),
        // time
        (&["s", "sec", "second", "seconds"][..], time(one_second)),
        (&["min", "minute", "minutes"][..], time(Time::new::<minute>(1.0))),
        (&["h", "hr", "hour", "hours"][..], time(one_hour)),
        (&["d", "day", "days"][..], time(one_day)),
        // volume rate (discharge)
        (
            &["m3/s", "m3 s-1", "cms", "cumec"][..],
            flow(VolumeRate::new::<cubic_meter_per_second>(1.0)),
        ),
        (
            &["L/s", "l/s", "L s-1", "l s-1"][..],
            flow(VolumeRate::new::<liter_per_second>(1.0)),
        ),
        (
            &["ft3/s", "ft3 s-1", "cfs"][..],
            flow(VolumeRate::new::<cubic_foot_per_second>(1.0)),
        ),
        (&["m3/h", "m3 h-1"][..], flow(Volume::new::<cubic_meter>(1.0) / one_hour)),
        (&["m3/d", "m3/day", "m3 d-1"][..], flow(Volume::new::<cubic_meter>(1.0) / one_day)),
        (&["ML/d", "ML/day", "ML d-1"][..], flow(Volume::new::<liter>(1.0e6) / one_day)),
        // depth rates (precipitation, runoff, evapotranspiration)
        (&["m/s", "m s-1"][..], speed(Velocity::new::<meter_per_second>(1.0))),
        (&["mm/s", "mm s-1"][..], speed(Length::new::<millimeter>(1.0) / one_second)),
        (&["mm/h", "mm/hr", "mm h-1"][..], speed(Length::new::<millimeter>(1.0) / one_hour)),
        (&["mm/d", "mm/day", "mm d-1"][..], speed(Length::new::<millimeter>(1.0) / one_day)),
        (&["in/d", "in/day"][..], speed(Length::new::<inch>(1.0) / one_day)),
        // temperature
        (
            &["K", "kelvin"][..],
            temp(
                ThermodynamicTemperature::new::<kelvin>(0.0),
                ThermodynamicTemperature::new::<kelvin>(1.0),
            ),
        ),
        (
            &["degC", "deg_C", "°C", "C", "celsius"][..],
            temp(
                ThermodynamicTemperature::new::<degree_celsius>(0.0),
                ThermodynamicTemperature::new::<degree_celsius>(1.0),
            ),
        ),
        (
            &["degF", "deg_F", "°F", "F", "fahrenheit"][..],
            temp(
                ThermodynamicTemperature::new::<degree_fahrenheit>(0.0),
                ThermodynamicTemperature::new::<degree_fahrenheit>(1.0),
            ),
        ),
        // pressure
        (&["Pa", "pascal"][..], pres(Pressure::new::<pascal>(1.0))),
        (&["hPa", "mbar"][..], pres(Pressure::new::<hectopascal>(1.0))),
        (&["kPa"][..], pres(Pressure::new::<kilopascal>(1.0))),
        (&["bar"][..], pres(Pressure::new::<bar>(1.0))),
        // mass
        (&["kg", "kilogram"][..], mass(Mass::new::<kilogram>(1.0))),
        (&["g", "gram"][..], mass(Mass::new::<gram>(1.0))),
        (&["t", "tonne"][..], mass(Mass::new::<kilogram>(1.0e3))),
        (
            &["kg/s", "kg s-1"][..],
            UnitDef::linear(
                Dimension::MassRate,
                MassRate::new::<kilogram_per_second>(1.0).get::<kilogram_per_second>(),
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Tolerances, nearly_equal};

    fn tol() -> Tolerances {
        Tolerances {
            abs: 1e-9,
            rel: 1e-9,
        }
    }

    #[test]
    fn litres_per_second_to_cumecs() {
        let reg = UnitRegistry::with_defaults();
        let v = reg.convert(250.0, "L/s", "m3/s").unwrap();
        assert!(nearly_equal(v, 0.25, tol()));
    }

    #[test]
    fn cumecs_to_cfs() {
        let reg = UnitRegistry::with_defaults();
        let v = reg.convert(1.0, "m3/s", "ft3/s").unwrap();
        assert!(nearly_equal(v, 35.314_666_7, Tolerances { abs: 1e-6, rel: 1e-6 }));
    }

    #[test]
    fn exponent_spellings_are_equivalent() {
        let reg = UnitRegistry::with_defaults();
        assert!(reg.contains("m^3/s"));
        assert!(reg.contains("m**3/s"));
        assert_eq!(reg.conversion("m^3/s", "m3/s").unwrap(), Conversion::IDENTITY);
    }

    #[test]
    fn celsius_to_kelvin_uses_offset() {
        let reg = UnitRegistry::with_defaults();
        let v = reg.convert(25.0, "degC", "K").unwrap();
        assert!(nearly_equal(v, 298.15, tol()));
        let f = reg.convert(100.0, "degC", "degF").unwrap();
        assert!(nearly_equal(f, 212.0, tol()));
    }

    #[test]
    fn depth_rate_per_day_to_per_hour() {
        let reg = UnitRegistry::with_defaults();
        let v = reg.convert(24.0, "mm/d", "mm/h").unwrap();
        assert!(nearly_equal(v, 1.0, tol()));
    }

    #[test]
    fn incompatible_dimensions_fail() {
        let reg = UnitRegistry::with_defaults();
        let err = reg.convert(1.0, "m3/s", "mm").unwrap_err();
        assert!(matches!(err, CoreError::IncompatibleUnits { .. }));
        let msg = err.to_string();
        assert!(msg.contains("m3/s") && msg.contains("mm"));
    }

    #[test]
    fn cf_mass_flux_spellings() {
        let reg = UnitRegistry::with_defaults();
        assert_eq!(reg.dimension("kg m-2 s-1").unwrap(), Dimension::MassFlux);
        assert_eq!(reg.dimension("kg/m2/s").unwrap(), Dimension::MassFlux);
        assert_eq!(reg.dimension("kg m^-2 s^-1").unwrap(), Dimension::MassFlux);
        let v = reg.convert(1.0, "kg m-2 s-1", "g m-2 d-1").unwrap();
        assert!(nearly_equal(v, 86_400_000.0, tol()));
    }

    #[test]
    fn compound_units_reduce_to_named_dimensions() {
        let reg = UnitRegistry::with_defaults();
        assert_eq!(reg.dimension("km2 mm").unwrap(), Dimension::Volume);
        assert_eq!(reg.dimension("m3 d-1").unwrap(), Dimension::VolumeRate);
        let v = reg.convert(86_400.0, "m**3 d**-1", "m3/s").unwrap();
        assert!(nearly_equal(v, 1.0, tol()));
        assert_eq!(
            reg.dimension("m s-2").unwrap(),
            Dimension::Derived { length: 1, mass: 0, time: -2 }
        );
        assert_eq!(reg.dimension("m s-2").unwrap().to_string(), "L T^-2");
    }

    #[test]
    fn compound_units_reject_offsets_and_unknown_factors() {
        let reg = UnitRegistry::with_defaults();
        assert!(!reg.contains("degC/d"));
        assert!(!reg.contains("kg m-2 fortnight-1"));
        assert!(!reg.contains("10"));
        assert!(matches!(
            reg.convert(1.0, "kg m-2 s-1", "mm/s"),
            Err(CoreError::IncompatibleUnits { .. })
        ));
    }

    #[test]
    fn unknown_unit_fails() {
        let reg = UnitRegistry::with_defaults();
        let err = reg.convert(1.0, "furlong/fortnight", "m/s").unwrap_err();
        assert!(matches!(err, CoreError::UnknownUnit { .. }));
    }

    #[test]
    fn registries_are_isolated() {
        let mut custom = UnitRegistry::with_defaults();
        custom.define("kcfs", UnitDef::linear(Dimension::VolumeRate, 28.316_846_592));
        custom.alias("thousand_cfs", "kcfs").unwrap();

        let default = UnitRegistry::with_defaults();
        assert!(custom.contains("thousand_cfs"));
        assert!(!default.contains("kcfs"));
    }

    #[test]
    fn convert_slice_keeps_no_data() {
        let reg = UnitRegistry::with_defaults();
        let mut values = [1000.0, f64::NAN, 2000.0];
        reg.convert_slice(&mut values, "L/s", "m3/s").unwrap();
        assert!(nearly_equal(values[0], 1.0, tol()));
        assert!(values[1].is_nan());
        assert!(nearly_equal(values[2], 2.0, tol()));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::{Tolerances, nearly_equal};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn conversion_there_and_back_is_identity(v in -1.0e6_f64..1.0e6_f64) {
            let reg = UnitRegistry::with_defaults();
            for (a, b) in [("m3/s", "cfs"), ("degC", "degF"), ("mm/d", "in/d"), ("ML", "acre-ft")] {
                let there = reg.convert(v, a, b).unwrap();
                let back = reg.convert(there, b, a).unwrap();
                let tol = Tolerances { abs: 1e-6, rel: 1e-9 };
                prop_assert!(nearly_equal(v, back, tol));
            }
        }
    }
}
