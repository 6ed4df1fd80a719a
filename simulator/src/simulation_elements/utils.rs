use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::{env, ops::RangeInclusive};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum TextConstant {
    Text(String),
    TextEnv(String),
}

impl TextConstant {
    pub fn value(&self) -> Result<String, ConfigError> {
        match self {
            TextConstant::Text(v) => Ok(v.clone()),
            TextConstant::TextEnv(environment_variable) => env::var(environment_variable)
                .map_err(|source| ConfigError::EnvVar {
                    name: environment_variable.clone(),
                    source,
                }),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Interval<T>
where
    T: Clone,
{
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Interval<T> {
    pub fn range_inclusive(&self) -> RangeInclusive<T> {
        self.min..=self.max
    }

    pub fn is_in(&self, value: T) -> bool {
        self.range_inclusive().contains(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_inclusive() {
        let interval = Interval { min: 1.0, max: 2.0 };
        assert!(interval.is_in(1.0));
        assert!(interval.is_in(2.0));
        assert!(!interval.is_in(2.0 + f64::EPSILON * 4.0));
        assert!(!interval.is_in(f64::NAN));
    }

    #[test]
    fn text_constant_from_json() {
        let text: TextConstant = serde_json::from_str(r#"{ "text": "calib.txt" }"#).unwrap();
        assert_eq!(text.value().unwrap(), "calib.txt");
    }

    #[test]
    fn missing_environment_variable() {
        let text = TextConstant::TextEnv("WAVEFORM_SIMULATOR_SURELY_UNSET_VARIABLE".to_owned());
        assert!(matches!(text.value(), Err(ConfigError::EnvVar { .. })));
    }
}
