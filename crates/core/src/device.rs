//! Device model: product whitelist, protocol variants, and hiddev node
//! discovery.

use std::fs::File;
use std::os::unix::io::{AsRawFd, RawFd};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use tracing::{debug, info, warn};

use crate::error::{Error, NotFoundReason, Result};
use crate::hiddev;
use crate::{pids, LOGITECH_VID};

/// Supported mouse models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseModel {
    MxRevolution,
    MxRevolution2,
    MxRevolution3,
    Mx5500,
}

/// Observed command-protocol generations.
///
/// Generation1 firmware answers a status query by echoing the query
/// header; Generation2 firmware echoes the last applied set command
/// instead, and packs the two `manual` buttons as separate bytes rather
/// than two nibbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Generation1,
    Generation2,
}

/// Per-model wire dialect, fixed at open time and passed explicitly to
/// every encode and decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVariant {
    /// Leading byte of every wheel command frame.
    pub leading: u8,
    pub generation: Generation,
}

impl MouseModel {
    /// Look up model from USB product ID.
    pub fn from_pid(pid: u16) -> Option<Self> {
        match pid {
            pids::MX_REVOLUTION => Some(Self::MxRevolution),
            pids::MX_REVOLUTION2 => Some(Self::MxRevolution2),
            pids::MX_REVOLUTION3 => Some(Self::MxRevolution3),
            pids::MX_5500 => Some(Self::Mx5500),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MxRevolution => "Logitech MX Revolution (RR41.01)",
            Self::MxRevolution2 => "Logitech MX Revolution (RQR02.00)",
            Self::MxRevolution3 => "Logitech MX Revolution",
            Self::Mx5500 => "Logitech MX-5500 combo",
        }
    }

    /// USB Product ID.
    pub fn pid(&self) -> u16 {
        match self {
            Self::MxRevolution => pids::MX_REVOLUTION,
            Self::MxRevolution2 => pids::MX_REVOLUTION2,
            Self::MxRevolution3 => pids::MX_REVOLUTION3,
            Self::Mx5500 => pids::MX_5500,
        }
    }

    /// Support for the combo receiver is based on user reports only.
    pub fn experimental(&self) -> bool {
        matches!(self, Self::Mx5500)
    }

    pub fn variant(&self) -> ProtocolVariant {
        let leading = match self {
            Self::Mx5500 => 2,
            _ => 1,
        };
        let generation = match self {
            // RQR02 firmware echoes the set command on queries.
            Self::MxRevolution2 => Generation::Generation2,
            _ => Generation::Generation1,
        };
        ProtocolVariant {
            leading,
            generation,
        }
    }
}

/// An opened, exclusively-owned hiddev node for one supported mouse.
///
/// The fd is closed when the handle drops; on fatal-error paths the
/// process exits and the kernel reclaims it.
pub struct DeviceHandle {
    file: File,
    model: MouseModel,
}

impl AsRawFd for DeviceHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl DeviceHandle {
    pub fn model(&self) -> MouseModel {
        self.model
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.model.variant()
    }

    /// Switch the fd to non-blocking reads and ask hiddev for usage-ref
    /// events. Neither failure is fatal; queries degrade but commands
    /// still work.
    fn init(&self) {
        if let Err(e) = fcntl(
            self.as_raw_fd(),
            FcntlArg::F_SETFL(OFlag::O_RDWR | OFlag::O_NONBLOCK),
        ) {
            warn!("fcntl(O_NONBLOCK): {e}");
        }
        let flags: libc::c_int = hiddev::HIDDEV_FLAG_UREF | hiddev::HIDDEV_FLAG_REPORT;
        if let Err(e) = unsafe { hiddev::hiddev_sflag(self.as_raw_fd(), &flags) } {
            warn!("HIDIOCSFLAG: {e}");
        }
    }
}

/// hiddev node path prefixes, tried in order.
const PATH_PREFIXES: [&str; 2] = ["/dev/usb/hiddev", "/dev/hiddev"];
/// Node indices scanned per prefix.
const NODES_PER_PREFIX: u32 = 16;

/// Scan the hiddev nodes and open the first whitelisted mouse.
///
/// Non-matching handles are closed as soon as their identity is read.
pub fn find_device() -> Result<DeviceHandle> {
    let mut denied_path: Option<String> = None;
    let mut any_opened = false;

    for prefix in PATH_PREFIXES {
        for idx in 0..NODES_PER_PREFIX {
            let path = format!("{prefix}{idx}");
            let file = match File::options().read(true).write(true).open(&path) {
                Ok(f) => f,
                Err(e) => {
                    if matches!(e.raw_os_error(), Some(libc::EPERM) | Some(libc::EACCES))
                        && denied_path.is_none()
                    {
                        denied_path = Some(path);
                    }
                    continue;
                }
            };
            any_opened = true;

            let mut dinfo = hiddev::DevInfo::default();
            if unsafe { hiddev::hiddev_gdevinfo(file.as_raw_fd(), &mut dinfo) }.is_err() {
                continue;
            }

            if dinfo.vendor as u16 != LOGITECH_VID {
                continue;
            }
            let Some(model) = MouseModel::from_pid(dinfo.product as u16) else {
                debug!(
                    path = %path,
                    pid = format_args!("0x{:04X}", dinfo.product as u16),
                    "Logitech device without a supported wheel"
                );
                continue;
            };

            info!(
                model = model.name(),
                pid = format_args!("0x{:04X}", model.pid()),
                path = %path,
                "Found supported mouse"
            );
            let handle = DeviceHandle { file, model };
            handle.init();
            return Ok(handle);
        }
    }

    let reason = if let Some(path) = denied_path {
        NotFoundReason::PermissionDenied { path }
    } else if any_opened {
        NotFoundReason::NoMatchingDevice
    } else {
        NotFoundReason::DriverMissing
    };
    Err(Error::NotFound(reason))
}
