use tracing::{info, warn};

use crate::AppError;
use crate::process::{hidden, run_elevated};

pub const TASK_NAME: &str = "idlenap";

/// Registers an ONLOGON task that starts the agent in the user's session.
pub async fn install_for_current_user() -> Result<(), AppError> {
    let exe = std::env::current_exe().map_err(AppError::Io)?;
    let exe_str = exe.display().to_string();
    // schtasks expects quotes around the full path
    let tr = format!("\"{exe_str}\"");

    let run_as = lookup_current_account_name()
        .or_else(fallback_env_account_name)
        .unwrap_or_default();
    let args_vec = build_schtasks_create_args(TASK_NAME, &tr, Some(&run_as));

    let status = hidden("schtasks")
        .args(args_vec.iter().map(|s| s.as_str()))
        .status()
        .await
        .map_err(AppError::Io)?;
    if !status.success() {
        warn!(%status, "schtasks /Create failed; retrying elevated");
        let elevated = run_elevated("schtasks", &args_vec).await?;
        if !elevated.success() {
            return Err(AppError::Platform(format!(
                "schtasks elevated /Create failed with status {elevated}"
            )));
        }
    }

    info!(task=TASK_NAME, path=%exe_str, "logon task installed for current user");
    Ok(())
}

pub async fn uninstall_for_current_user() -> Result<(), AppError> {
    let status = hidden("schtasks")
        .args(["/Delete", "/F", "/TN", TASK_NAME])
        .status()
        .await
        .map_err(AppError::Io)?;
    if !status.success() {
        // Treat missing task as success
        warn!(task=TASK_NAME, status=%status, "schtasks /Delete failed or task missing; continuing");
    }
    Ok(())
}

pub async fn task_exists() -> bool {
    match hidden("schtasks")
        .args(["/Query", "/TN", TASK_NAME])
        .output()
        .await
    {
        Ok(out) => out.status.success(),
        Err(e) => {
            warn!(error=%e, "schtasks /Query failed");
            false
        }
    }
}

fn build_schtasks_create_args(
    task_name: &str,
    tr_quoted: &str,
    run_as: Option<&str>,
) -> Vec<String> {
    let mut v: Vec<String> = [
        "/Create", "/F", "/SC", "ONLOGON", "/RL", "LIMITED", "/IT", "/TN", task_name, "/TR",
        tr_quoted,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    if let Some(ru) = run_as.filter(|ru| !ru.is_empty()) {
        v.push("/RU".to_string());
        v.push(ru.to_string());
    }
    v
}

/// Resolve current user account name as DOMAIN\\User using the access token SID.
fn lookup_current_account_name() -> Option<String> {
    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
    use windows_sys::Win32::Security::{
        GetTokenInformation, LookupAccountSidW, TOKEN_QUERY, TOKEN_USER, TokenUser,
    };
    use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    unsafe {
        let mut token: HANDLE = std::ptr::null_mut();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) == 0 {
            return None;
        }
        let mut needed: u32 = 0;
        let _ = GetTokenInformation(token, TokenUser, std::ptr::null_mut(), 0, &mut needed);
        if needed == 0 {
            CloseHandle(token);
            return None;
        }
        let mut buf: Vec<u8> = vec![0u8; needed as usize];
        let ok = GetTokenInformation(
            token,
            TokenUser,
            buf.as_mut_ptr() as *mut _,
            needed,
            &mut needed,
        );
        CloseHandle(token);
        if ok == 0 {
            return None;
        }
        let tu = &*(buf.as_ptr() as *const TOKEN_USER);

        let mut name_len: u32 = 0;
        let mut domain_len: u32 = 0;
        let mut pe_use: i32 = 0;
        let _ = LookupAccountSidW(
            std::ptr::null(),
            tu.User.Sid,
            std::ptr::null_mut(),
            &mut name_len,
            std::ptr::null_mut(),
            &mut domain_len,
            &mut pe_use,
        );
        if name_len == 0 {
            return None;
        }
        let mut name_buf: Vec<u16> = vec![0u16; name_len as usize];
        let mut domain_buf: Vec<u16> = vec![0u16; domain_len.max(1) as usize];
        if LookupAccountSidW(
            std::ptr::null(),
            tu.User.Sid,
            name_buf.as_mut_ptr(),
            &mut name_len,
            domain_buf.as_mut_ptr(),
            &mut domain_len,
            &mut pe_use,
        ) == 0
        {
            return None;
        }
        let name = String::from_utf16_lossy(&name_buf[..name_len as usize]);
        let domain = String::from_utf16_lossy(&domain_buf[..domain_len as usize]);
        Some(qualified(&domain, &name))
    }
}

fn fallback_env_account_name() -> Option<String> {
    let username = std::env::var("USERNAME").ok()?;
    let domain = std::env::var("USERDOMAIN")
        .ok()
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .unwrap_or_default();
    Some(qualified(&domain, &username))
}

fn qualified(domain: &str, name: &str) -> String {
    if domain.is_empty() {
        name.to_string()
    } else {
        format!("{domain}\\{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_args_skip_empty_account() {
        let args = build_schtasks_create_args("idlenap", "\"C:\\idlenap.exe\"", Some(""));
        assert!(!args.contains(&"/RU".to_string()));
        assert_eq!(args[3], "ONLOGON");

        let args = build_schtasks_create_args("idlenap", "x", Some("PC\\me"));
        assert_eq!(&args[args.len() - 2..], ["/RU", "PC\\me"]);
    }
}
