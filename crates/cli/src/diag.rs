//! Troubleshooting text shown when no supported mouse is found.

use freewheel_core::error::NotFoundReason;
use freewheel_core::{pids, LOGITECH_VID};

/// Map an enumeration failure to the prose the user needs.
pub fn troubleshooting(reason: &NotFoundReason) -> String {
    match reason {
        NotFoundReason::NoMatchingDevice => format!(
            "No Logitech MX-Revolution ({vid:04x}:{p1:04x}, {vid:04x}:{p2:04x}, \
             {vid:04x}:{p3:04x}, or {vid:04x}:{p4:04x}) found.",
            vid = LOGITECH_VID,
            p1 = pids::MX_REVOLUTION,
            p2 = pids::MX_REVOLUTION2,
            p3 = pids::MX_REVOLUTION3,
            p4 = pids::MX_5500,
        ),
        NotFoundReason::PermissionDenied { path } => format!(
            "No permission to access hiddev ({path})\nTry 'sudo freewheel ...'"
        ),
        NotFoundReason::DriverMissing => "\
Hiddev kernel driver not found.  Check with 'dmesg | grep hiddev' whether
it is present in the kernel.  If it is, make sure that the device nodes
(either /dev/usb/hiddev0-15 or /dev/hiddev0-15) are present.  You can
create them with

\tmkdir /dev/usb
\tmknod /dev/usb/hiddev0 c 180 96
\tmknod /dev/usb/hiddev1 c 180 97
\t...

or better by adding a rule to the udev database in
/etc/udev/rules.d/10-local.rules

\tBUS=\"usb\", KERNEL=\"hiddev[0-9]*\", NAME=\"usb/%k\", MODE=\"660\"

Sometimes running from superuser may help."
            .to_string(),
    }
}
