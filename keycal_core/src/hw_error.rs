//! Maps `Box<dyn Error>` from trait boundaries to typed `CalError`.
//!
//! The traits in `keycal_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `keycal_hardware::HwError` downcasting.

use crate::error::CalError;

/// Map an error returned by a `Storage` collaborator.
pub fn map_storage_error(e: &(dyn std::error::Error + 'static)) -> CalError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<keycal_hardware::error::HwError>() {
            return match hw {
                keycal_hardware::error::HwError::ChannelCount { expected, got } => {
                    CalError::ChannelCount {
                        expected: *expected,
                        got: *got,
                    }
                }
                other => CalError::Storage(other.to_string()),
            };
        }
    }
    CalError::Storage(e.to_string())
}

/// Map an error returned by a `SensorArray` or `SwitchBank` collaborator.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_sensor_error(e: &(dyn std::error::Error + 'static)) -> CalError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<keycal_hardware::error::HwError>() {
            return match hw {
                keycal_hardware::error::HwError::ChannelCount { expected, got } => {
                    CalError::ChannelCount {
                        expected: *expected,
                        got: *got,
                    }
                }
                other => CalError::Sensor(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CalError::Timeout
    } else {
        CalError::Sensor(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_timeout_maps_to_timeout() {
        let e: Box<dyn std::error::Error + Send + Sync> = "adc frame timeout".into();
        assert_eq!(map_sensor_error(&*e), CalError::Timeout);
    }

    #[test]
    fn other_storage_errors_keep_message() {
        let e: Box<dyn std::error::Error + Send + Sync> = "eeprom busy".into();
        assert_eq!(map_storage_error(&*e), CalError::Storage("eeprom busy".into()));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_sensor_channel_count_is_downcast() {
        let e: Box<dyn std::error::Error + Send + Sync> =
            Box::new(keycal_hardware::error::HwError::ChannelCount {
                expected: 88,
                got: 61,
            });
        assert_eq!(
            map_sensor_error(&*e),
            CalError::ChannelCount {
                expected: 88,
                got: 61
            }
        );
    }
}
