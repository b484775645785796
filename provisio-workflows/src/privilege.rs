//! ABOUTME: Process-elevation detection backing the install privilege gate

/// True when the current process is running with elevated privileges.
///
/// POSIX: effective UID 0, falling back to the weaker `USER`/`EUID`
/// environment signal when the syscall result alone says no. Windows: the
/// process token carries the elevated Administrators group.
#[must_use]
pub fn current_process_is_elevated() -> bool {
    #[cfg(unix)]
    {
        if unsafe { libc::geteuid() } == 0 {
            return true;
        }
    }
    #[cfg(windows)]
    {
        if windows_is_administrator() {
            return true;
        }
    }
    matches!(std::env::var("USER").as_deref(), Ok("root"))
        || matches!(std::env::var("EUID").as_deref(), Ok("0"))
}

#[cfg(windows)]
fn windows_is_administrator() -> bool {
    use std::mem;
    use std::ptr;
    use winapi::shared::minwindef::DWORD;
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::{GetCurrentProcess, OpenProcessToken};
    use winapi::um::securitybaseapi::GetTokenInformation;
    use winapi::um::winnt::{TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};

    unsafe {
        let mut token = ptr::null_mut();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) == 0 {
            return false;
        }
        let mut elevation: TOKEN_ELEVATION = mem::zeroed();
        let mut returned_size: DWORD = mem::size_of::<TOKEN_ELEVATION>() as DWORD;
        let ok = GetTokenInformation(
            token,
            TokenElevation,
            (&mut elevation as *mut TOKEN_ELEVATION).cast(),
            returned_size,
            &mut returned_size,
        );
        CloseHandle(token);
        ok != 0 && elevation.TokenIsElevated != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_effective_uid_implies_elevated() {
        #[cfg(unix)]
        if unsafe { libc::geteuid() } == 0 {
            assert!(current_process_is_elevated());
        }
    }
}
