use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    Usb,
    Pci,
    Bluetooth,
    Unknown,
}

impl PortKind {
    pub fn name(self) -> &'static str {
        match self {
            PortKind::Usb => "usb",
            PortKind::Pci => "pci",
            PortKind::Bluetooth => "bluetooth",
            PortKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    pub port_name: String,
    pub kind: PortKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usb: Option<UsbDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsbDetails {
    pub vid: u16,
    pub pid: u16,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl PortInfo {
    pub fn describe(&self) -> String {
        match &self.usb {
            Some(u) => format!(
                "{} usb {:04X}:{:04X} {}",
                self.port_name,
                u.vid,
                u.pid,
                u.product.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_string(),
            None => format!("{} {}", self.port_name, self.kind.name()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ListPortsError {
    #[error("serial port enumeration failed: {0}")]
    Serial(#[from] serialport::Error),
}

pub fn list_ports() -> Result<Vec<PortInfo>, ListPortsError> {
    let mut out: Vec<PortInfo> = serialport::available_ports()?
        .into_iter()
        .map(port_info)
        .collect();

    out.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.port_name.cmp(&b.port_name)));
    Ok(out)
}

fn port_info(p: serialport::SerialPortInfo) -> PortInfo {
    let serialport::SerialPortInfo {
        port_name,
        port_type,
    } = p;

    match port_type {
        serialport::SerialPortType::UsbPort(usb) => PortInfo {
            port_name,
            kind: PortKind::Usb,
            usb: Some(UsbDetails {
                vid: usb.vid,
                pid: usb.pid,
                serial_number: usb.serial_number,
                manufacturer: usb.manufacturer,
                product: usb.product,
            }),
        },
        serialport::SerialPortType::PciPort => PortInfo {
            port_name,
            kind: PortKind::Pci,
            usb: None,
        },
        serialport::SerialPortType::BluetoothPort => PortInfo {
            port_name,
            kind: PortKind::Bluetooth,
            usb: None,
        },
        serialport::SerialPortType::Unknown => PortInfo {
            port_name,
            kind: PortKind::Unknown,
            usb: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb_port_info_keeps_ids() {
        let info = port_info(serialport::SerialPortInfo {
            port_name: "/dev/ttyUSB0".to_string(),
            port_type: serialport::SerialPortType::UsbPort(serialport::UsbPortInfo {
                vid: 0x0403,
                pid: 0x6001,
                serial_number: None,
                manufacturer: Some("FTDI".to_string()),
                product: Some("FT232R".to_string()),
            }),
        });
        assert_eq!(info.kind, PortKind::Usb);
        assert_eq!(info.describe(), "/dev/ttyUSB0 usb 0403:6001 FT232R");
    }

    #[test]
    fn non_usb_port_has_no_details() {
        let info = port_info(serialport::SerialPortInfo {
            port_name: "/dev/ttyS0".to_string(),
            port_type: serialport::SerialPortType::Unknown,
        });
        assert_eq!(info.usb, None);
        assert_eq!(info.describe(), "/dev/ttyS0 unknown");
    }
}
