//! Serial port discovery and parameter conversion
//!
//! Enumerates candidate RS-232 adapters and translates [`LineConfig`] into
//! `serialport` settings.

use super::{FlowControl, LineConfig, SerialParity};

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            vid: None,
            pid: None,
        }
    }
}

/// List serial ports that could plausibly be wired to a television
///
/// Only USB and ACM adapters and native COM ports are returned.
pub fn list_ports() -> std::io::Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_candidate_port(&port.port_name))
        .map(|port| {
            let mut info = SerialPortInfo::new(&port.port_name, get_port_description(port));
            if let serialport::SerialPortType::UsbPort(usb) = &port.port_type {
                info.vid = Some(usb.vid);
                info.pid = Some(usb.pid);
                info.manufacturer = usb.manufacturer.clone();
            }
            info
        })
        .collect())
}

fn is_candidate_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/ttyS")
        || port_name.starts_with("/dev/cu.usbserial-")
}

fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

pub(crate) fn to_serialport_data_bits(bits: u8) -> Option<serialport::DataBits> {
    match bits {
        5 => Some(serialport::DataBits::Five),
        6 => Some(serialport::DataBits::Six),
        7 => Some(serialport::DataBits::Seven),
        8 => Some(serialport::DataBits::Eight),
        _ => None,
    }
}

pub(crate) fn to_serialport_stop_bits(bits: u8) -> Option<serialport::StopBits> {
    match bits {
        1 => Some(serialport::StopBits::One),
        2 => Some(serialport::StopBits::Two),
        _ => None,
    }
}

pub(crate) fn to_serialport_parity(parity: SerialParity) -> serialport::Parity {
    match parity {
        SerialParity::None => serialport::Parity::None,
        SerialParity::Even => serialport::Parity::Even,
        SerialParity::Odd => serialport::Parity::Odd,
    }
}

pub(crate) fn to_serialport_flow_control(flow: FlowControl) -> serialport::FlowControl {
    match flow {
        FlowControl::None => serialport::FlowControl::None,
        FlowControl::Software => serialport::FlowControl::Software,
        FlowControl::Hardware => serialport::FlowControl::Hardware,
    }
}

/// Check that a line configuration can be expressed as serial settings
pub fn validate_line_config(config: &LineConfig) -> Result<(), String> {
    if config.baud_rate == 0 {
        return Err("baud rate must be > 0".to_string());
    }
    if to_serialport_data_bits(config.data_bits).is_none() {
        return Err(format!("invalid data bits: {}", config.data_bits));
    }
    if to_serialport_stop_bits(config.stop_bits).is_none() {
        return Err(format!("invalid stop bits: {}", config.stop_bits));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_ports() {
        assert!(is_candidate_port("/dev/ttyUSB0"));
        assert!(is_candidate_port("/dev/ttyACM1"));
        assert!(is_candidate_port("COM3"));
        assert!(!is_candidate_port("COM"));
        assert!(!is_candidate_port("/dev/tty0"));
        assert!(!is_candidate_port("/dev/null"));
    }

    #[test]
    fn test_validate_line_config() {
        assert!(validate_line_config(&LineConfig::default()).is_ok());

        let config = LineConfig {
            data_bits: 9,
            ..Default::default()
        };
        assert!(validate_line_config(&config).is_err());

        let config = LineConfig {
            stop_bits: 3,
            ..Default::default()
        };
        assert!(validate_line_config(&config).is_err());

        let config = LineConfig {
            baud_rate: 0,
            ..Default::default()
        };
        assert!(validate_line_config(&config).is_err());
    }
}
