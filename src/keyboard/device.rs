use crate::error::{FapsError, FapsResult};
use crate::keyboard::KeyEvent;
use std::convert::TryFrom;
use std::fs::{self, File};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

const IOC_NRBITS: libc::c_ulong = 8;
const IOC_TYPEBITS: libc::c_ulong = 8;
const IOC_SIZEBITS: libc::c_ulong = 14;
const IOC_NRSHIFT: libc::c_ulong = 0;
const IOC_TYPESHIFT: libc::c_ulong = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: libc::c_ulong = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: libc::c_ulong = IOC_SIZESHIFT + IOC_SIZEBITS;
const IOC_READ: libc::c_ulong = 2;

/// Read a batch of key events from the specified file descriptor.
///
/// Returns `Ok(None)` once the device reports end-of-file. Events that are not
/// `EV_KEY` (e.g. `EV_SYN` separators) are dropped, so a batch may be empty.
pub(crate) fn read_key_events(fd: RawFd) -> io::Result<Option<Vec<KeyEvent>>> {
    Ok(read_input_events(fd)?.map(|events| {
        events
            .iter()
            .filter_map(|e| KeyEvent::try_from(e).ok())
            .collect()
    }))
}

fn read_input_events(fd: RawFd) -> io::Result<Option<Vec<libc::input_event>>> {
    const MAX_INPUT_EV: usize = 128;

    let mut input_events = [mem::MaybeUninit::<libc::input_event>::uninit(); MAX_INPUT_EV];

    let n = unsafe {
        libc::read(
            fd,
            input_events.as_mut_ptr() as *mut _,
            MAX_INPUT_EV * mem::size_of::<libc::input_event>(),
        )
    };

    if n < 0 {
        return Err(io::Error::last_os_error());
    }

    if n == 0 {
        return Ok(None);
    }

    let n = (n as usize) / mem::size_of::<libc::input_event>();

    // The first n elements of the array are initialized:
    Ok(Some(
        input_events[..n]
            .iter()
            .map(|e| unsafe { e.assume_init() })
            .collect(),
    ))
}

/// Set the `O_NONBLOCK` flag for the specified file descriptor.
pub(crate) fn set_nonblocking(f: &File) -> FapsResult<()> {
    let res = unsafe { libc::fcntl(f.as_raw_fd(), libc::F_SETFL, libc::O_NONBLOCK) };

    if res < 0 {
        return Err(io::Error::last_os_error().into());
    }

    Ok(())
}

/// Read the name of the specified keyboard device using the `EVIOCGNAME` ioctl.
pub(crate) fn read_name(f: &File) -> FapsResult<String> {
    const DEVICE_NAME_MAX_LEN: usize = 512;

    let mut device_name = [0u8; DEVICE_NAME_MAX_LEN];

    let eviocgname = (IOC_READ << IOC_DIRSHIFT)
        | (('E' as libc::c_ulong) << IOC_TYPESHIFT)
        | (0x06 << IOC_NRSHIFT)
        | ((device_name.len() as libc::c_ulong) << IOC_SIZESHIFT);

    ioctl(
        f.as_raw_fd(),
        eviocgname,
        device_name.as_mut_ptr() as *mut libc::c_ulong,
    )?;

    let len = device_name
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(device_name.len());

    Ok(String::from_utf8_lossy(&device_name[..len]).into())
}

/// Read the features supported by the specified device using the `EVIOCGBIT` ioctl.
pub(crate) fn read_event_flags(f: &File) -> FapsResult<libc::c_ulong> {
    let mut ev_flags: libc::c_ulong = 0;

    let eviocgbit = (IOC_READ << IOC_DIRSHIFT)
        | (('E' as libc::c_ulong) << IOC_TYPESHIFT)
        | (0x20 << IOC_NRSHIFT)
        | (((mem::size_of::<libc::c_ulong>()) as libc::c_ulong) << IOC_SIZESHIFT);

    ioctl(
        f.as_raw_fd(),
        eviocgbit,
        (&mut ev_flags) as *mut libc::c_ulong,
    )?;

    Ok(ev_flags)
}

/// Get all character devices from `dir`.
pub(crate) fn find_char_devices(dir: &Path) -> FapsResult<impl Iterator<Item = PathBuf>> {
    let entries = fs::read_dir(dir).map_err(FapsError::Enumeration)?;

    Ok(entries.filter_map(|entry| {
        let entry = entry.ok()?;
        let file_type = fs::metadata(entry.path()).ok()?.file_type();

        if file_type.is_char_device() {
            Some(entry.path())
        } else {
            None
        }
    }))
}

fn ioctl(fd: RawFd, request: libc::c_ulong, buf: *mut libc::c_ulong) -> FapsResult<()> {
    let res = unsafe { libc::ioctl(fd, request as _, buf) };

    if res < 0 {
        Err(io::Error::last_os_error().into())
    } else {
        Ok(())
    }
}
