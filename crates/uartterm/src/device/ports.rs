use crate::device::DeviceError;
use serialport::SerialPortType;

/// A serial port the system reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
  pub name: String,
  pub kind: &'static str,
  pub description: String,
}

/// List available serial ports, USB adapters first.
///
/// On macOS only `/dev/cu.*` devices are listed: the `/dev/tty.*` twins block
/// on open waiting for carrier detect.
///
/// # Errors
/// Returns `DeviceError::Enumerate` if the system query fails.
pub fn list_ports() -> Result<Vec<PortInfo>, DeviceError> {
  let ports = serialport::available_ports().map_err(DeviceError::Enumerate)?;
  let mut infos: Vec<PortInfo> = ports
    .into_iter()
    .filter(|_p| {
      #[cfg(target_os = "macos")]
      {
        !_p.port_name.starts_with("/dev/tty.")
      }
      #[cfg(not(target_os = "macos"))]
      {
        true
      }
    })
    .map(|p| {
      let (kind, description) = match p.port_type {
        SerialPortType::UsbPort(usb) => {
          let label = [usb.manufacturer, usb.product]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
          let ids = format!("{:04x}:{:04x}", usb.vid, usb.pid);
          let description = if label.is_empty() {
            ids
          } else {
            format!("{label} ({ids})")
          };
          ("USB", description)
        }
        SerialPortType::BluetoothPort => ("Bluetooth", String::new()),
        SerialPortType::PciPort => ("PCI", String::new()),
        SerialPortType::Unknown => ("Unknown", String::new()),
      };
      PortInfo {
        name: p.port_name,
        kind,
        description,
      }
    })
    .collect();
  infos.sort_by_key(|info| (info.kind != "USB", info.name.clone()));
  Ok(infos)
}

/// First port worth connecting to when none was configured.
///
/// # Errors
/// Returns `DeviceError::Enumerate` if the system query fails.
pub fn default_port() -> Result<Option<String>, DeviceError> {
  Ok(list_ports()?.into_iter().next().map(|p| p.name))
}
