//! Device Information Service helper.

use tracing::debug;
use uuid::Uuid;

use crate::ble::uuids::*;
use crate::error::{Error, Result};
use crate::link::GattController;

/// Strings published by the Device Information Service.
///
/// Characteristics the peer does not expose are left as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInformation {
    /// Manufacturer name.
    pub manufacturer_name: Option<String>,
    /// Model number.
    pub model_number: Option<String>,
    /// Serial number.
    pub serial_number: Option<String>,
    /// Hardware revision.
    pub hardware_revision: Option<String>,
    /// Firmware revision.
    pub firmware_revision: Option<String>,
    /// Software revision.
    pub software_revision: Option<String>,
}

impl DeviceInformation {
    /// Read every available Device Information string.
    ///
    /// Services must have been discovered first.
    pub async fn read<C>(controller: &C) -> Result<Self>
    where
        C: GattController + ?Sized,
    {
        let service = controller
            .get_service(&DEVICE_INFO_SERVICE_UUID)?
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: DEVICE_INFO_SERVICE_UUID.to_string(),
            })?;

        let mut info = Self::default();
        let fields: [(Uuid, &mut Option<String>); 6] = [
            (MANUFACTURER_NAME_UUID, &mut info.manufacturer_name),
            (MODEL_NUMBER_UUID, &mut info.model_number),
            (SERIAL_NUMBER_UUID, &mut info.serial_number),
            (HARDWARE_REVISION_UUID, &mut info.hardware_revision),
            (FIRMWARE_REVISION_UUID, &mut info.firmware_revision),
            (SOFTWARE_REVISION_UUID, &mut info.software_revision),
        ];

        for (uuid, field) in fields {
            let Some(characteristic) = service.characteristic(&uuid) else {
                debug!("Device information characteristic {} not present", uuid);
                continue;
            };

            let read = controller.read_characteristic(characteristic).await?;
            let text = String::from_utf8(read.value.to_vec()).map_err(|_| Error::InvalidData {
                context: format!("Invalid UTF-8 in characteristic {}", uuid),
            })?;
            *field = Some(text.trim_end_matches('\0').to_string());
        }

        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::types::{GattCharacteristic, GattService};
    use crate::link::MockGattController;
    use btleplug::api::CharPropFlags;
    use pretty_assertions::assert_eq;

    fn string_characteristic(uuid: Uuid) -> GattCharacteristic {
        GattCharacteristic::new(uuid, DEVICE_INFO_SERVICE_UUID, CharPropFlags::READ)
    }

    #[tokio::test]
    async fn test_read_available_strings() {
        let mut controller = MockGattController::new();
        controller.expect_get_service().returning(|uuid| {
            Ok(Some(GattService {
                uuid: *uuid,
                primary: true,
                characteristics: vec![
                    string_characteristic(MANUFACTURER_NAME_UUID),
                    string_characteristic(FIRMWARE_REVISION_UUID),
                ],
            }))
        });
        controller
            .expect_read_characteristic()
            .times(2)
            .returning(|c| {
                let value: &'static [u8] = if c.uuid == MANUFACTURER_NAME_UUID {
                    b"Acme"
                } else {
                    b"1.4.2\0"
                };
                Ok(c.clone().with_value(value))
            });

        let info = DeviceInformation::read(&controller).await.unwrap();

        assert_eq!(
            info,
            DeviceInformation {
                manufacturer_name: Some("Acme".to_string()),
                firmware_revision: Some("1.4.2".to_string()),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_service() {
        let mut controller = MockGattController::new();
        controller.expect_get_service().returning(|_| Ok(None));

        let result = DeviceInformation::read(&controller).await;
        assert!(matches!(result, Err(Error::ServiceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let mut controller = MockGattController::new();
        controller.expect_get_service().returning(|uuid| {
            Ok(Some(GattService {
                uuid: *uuid,
                primary: true,
                characteristics: vec![string_characteristic(MODEL_NUMBER_UUID)],
            }))
        });
        controller
            .expect_read_characteristic()
            .returning(|c| Ok(c.clone().with_value(vec![0xff, 0xfe])));

        let result = DeviceInformation::read(&controller).await;
        assert!(matches!(result, Err(Error::InvalidData { .. })));
    }
}
