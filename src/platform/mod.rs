use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use wait_timeout::ChildExt;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs `cmd` to completion. Output is decoded lossily so a stray non-UTF-8
/// byte never loses the rest of the text. Without a timeout the call blocks
/// until the process exits.
pub fn run_command(cmd: &str, args: &[&str], timeout: Option<Duration>) -> Result<CommandOutput> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to start process: {cmd}"))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match timeout {
        None => child
            .wait()
            .with_context(|| format!("failed to wait for process: {cmd}"))?,
        Some(timeout) => match wait_or_kill(&mut child, timeout, cmd)? {
            Some(status) => status,
            None => return Err(anyhow!("timed out after {timeout:?}: {cmd}")),
        },
    };

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout: join_drain(stdout),
        stderr: join_drain(stderr),
    })
}

fn wait_or_kill(
    child: &mut Child,
    timeout: Duration,
    cmd: &str,
) -> Result<Option<std::process::ExitStatus>> {
    let status = child
        .wait_timeout(timeout)
        .with_context(|| format!("failed to wait for process: {cmd}"))?;
    if status.is_none() {
        let _ = child.kill();
        let _ = child.wait();
    }
    Ok(status)
}

// Pipes are drained on their own threads so a chatty process cannot fill the
// pipe buffer and stall before it exits.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    let mut pipe = pipe?;
    Some(std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    }))
}

fn join_drain(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct InvokingUser {
    pub username: Option<String>,
    pub home_dir: PathBuf,
}

/// The user behind `sudo`, when the tool runs elevated through it.
pub fn invoking_user() -> Option<InvokingUser> {
    let uid = std::env::var("SUDO_UID").ok()?.parse::<u32>().ok()?;
    let username = std::env::var("SUDO_USER").ok();
    let home_dir = home_dir_for_uid(uid)?;

    Some(InvokingUser {
        username,
        home_dir,
    })
}

pub fn effective_home_dir() -> Result<PathBuf> {
    if let Some(user) = invoking_user() {
        return Ok(user.home_dir);
    }
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("neither HOME nor USERPROFILE is set"))
}

pub fn desktop_dir() -> Result<PathBuf> {
    Ok(effective_home_dir()?.join("Desktop"))
}

/// Name of the principal running the tool, for report headers.
pub fn current_username() -> Option<String> {
    if let Some(name) = invoking_user().and_then(|u| u.username) {
        return Some(name);
    }

    #[cfg(windows)]
    {
        let user = std::env::var("USERNAME").ok().filter(|s| !s.is_empty())?;
        return match std::env::var("USERDOMAIN") {
            Ok(domain) if !domain.is_empty() => Some(format!("{domain}\\{user}")),
            _ => Some(user),
        };
    }

    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions.
        let uid = unsafe { libc::geteuid() } as u32;
        username_for_uid(uid).or_else(|| std::env::var("USER").ok().filter(|s| !s.is_empty()))
    }

    #[cfg(all(not(unix), not(windows)))]
    {
        std::env::var("USER").ok().filter(|s| !s.is_empty())
    }
}

#[cfg(unix)]
fn with_passwd<T>(uid: u32, f: impl FnOnce(&libc::passwd) -> Option<T>) -> Option<T> {
    unsafe {
        let bufsize = libc::sysconf(libc::_SC_GETPW_R_SIZE_MAX);
        let bufsize = if bufsize <= 0 {
            16 * 1024
        } else {
            bufsize as usize
        };
        let mut buf = vec![0u8; bufsize];
        let mut pwd: libc::passwd = std::mem::zeroed();
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        let rc = libc::getpwuid_r(
            uid as libc::uid_t,
            &mut pwd,
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            &mut result,
        );
        if rc != 0 || result.is_null() {
            return None;
        }
        f(&pwd)
    }
}

#[cfg(unix)]
fn passwd_field(ptr: *const libc::c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null passwd fields are NUL-terminated strings owned by the
    // buffer passed to getpwuid_r, which outlives this call.
    let s = unsafe { std::ffi::CStr::from_ptr(ptr) }
        .to_string_lossy()
        .to_string();
    if s.trim().is_empty() { None } else { Some(s) }
}

#[cfg(unix)]
fn home_dir_for_uid(uid: u32) -> Option<PathBuf> {
    with_passwd(uid, |pwd| passwd_field(pwd.pw_dir).map(PathBuf::from))
}

#[cfg(unix)]
fn username_for_uid(uid: u32) -> Option<String> {
    with_passwd(uid, |pwd| passwd_field(pwd.pw_name))
}

#[cfg(not(unix))]
fn home_dir_for_uid(_uid: u32) -> Option<PathBuf> {
    None
}
