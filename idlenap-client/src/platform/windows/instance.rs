use windows_sys::Win32::Foundation::{CloseHandle, ERROR_ALREADY_EXISTS, GetLastError, HANDLE};
use windows_sys::Win32::System::Threading::{CreateMutexW, ReleaseMutex};

use super::wide;
use crate::AppError;

pub const MUTEX_NAME: &str = r"Local\idlenap_single_instance";

/// Named mutex held for the lifetime of the agent.
#[derive(Debug)]
pub struct SingleInstance {
    // HANDLE as an integer so the guard can move between threads.
    handle: usize,
}

impl SingleInstance {
    /// `Ok(None)` when another process already owns the mutex.
    pub fn acquire() -> Result<Option<Self>, AppError> {
        let name = wide(MUTEX_NAME);
        let handle = unsafe { CreateMutexW(std::ptr::null(), 1, name.as_ptr()) };
        if handle.is_null() {
            return Err(AppError::Platform("CreateMutexW failed".into()));
        }
        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            unsafe { CloseHandle(handle) };
            return Ok(None);
        }
        Ok(Some(Self {
            handle: handle as usize,
        }))
    }
}

impl Drop for SingleInstance {
    fn drop(&mut self) {
        let handle = self.handle as HANDLE;
        unsafe {
            ReleaseMutex(handle);
            CloseHandle(handle);
        }
    }
}
