use idlenap_shared::services::ProbeError;
use windows_sys::Win32::Networking::WinInet::InternetGetConnectedState;
use windows_sys::Win32::System::SystemInformation::{GetTickCount, GetTickCount64};
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};

/// Seconds since the last keyboard or mouse input in this session.
pub fn idle_seconds() -> Result<u64, ProbeError> {
    let mut info = LASTINPUTINFO {
        cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
        dwTime: 0,
    };
    if unsafe { GetLastInputInfo(&mut info) } == 0 {
        return Err(ProbeError::Os("GetLastInputInfo failed".into()));
    }
    // Both are 32-bit tick counts; wrapping_sub survives the 49.7-day rollover.
    let now = unsafe { GetTickCount() };
    Ok(u64::from(now.wrapping_sub(info.dwTime)) / 1000)
}

pub fn uptime_seconds() -> Result<u64, ProbeError> {
    Ok(unsafe { GetTickCount64() } / 1000)
}

pub fn link_up() -> bool {
    let mut flags: u32 = 0;
    unsafe { InternetGetConnectedState(&mut flags, 0) != 0 }
}
