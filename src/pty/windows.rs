//! Raw ConPTY backend.
//!
//! Overall shape (pipe pair, `CreatePseudoConsole`, attribute-list dance,
//! poll-then-read via `PeekNamedPipe`) follows the usual raw-ConPTY wrapper
//! pattern, ported from the `windows` crate's safe wrappers to the raw
//! `windows-sys` bindings this crate depends on, with a blocking poll loop
//! and an idempotent close added on top.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows_sys::Win32::Storage::FileSystem::{ReadFile, WriteFile};
use windows_sys::Win32::System::Console::{
    ClosePseudoConsole, CreatePseudoConsole, ResizePseudoConsole, COORD, HPCON,
};
use windows_sys::Win32::System::Pipes::{CreatePipe, PeekNamedPipe};
use windows_sys::Win32::System::Threading::{
    CreateProcessW, DeleteProcThreadAttributeList, GetExitCodeProcess,
    InitializeProcThreadAttributeList, UpdateProcThreadAttribute, WaitForSingleObject,
    EXTENDED_STARTUPINFO_PRESENT, LPPROC_THREAD_ATTRIBUTE_LIST, PROCESS_INFORMATION,
    STARTUPINFOEXW,
};

use super::{PtyBackend, PtySize};
use crate::error::{DaemonError, Result};

const PROC_THREAD_ATTRIBUTE_PSEUDOCONSOLE: usize = 0x0002_0016;
const PTY_POLL_INTERVAL: Duration = Duration::from_millis(10);

fn last_error(context: &str) -> DaemonError {
    let code = unsafe { windows_sys::Win32::Foundation::GetLastError() };
    DaemonError::System(format!("{}: win32 error {}", context, code))
}

/// Owns a pseudo-console, its pipe handles, and the attached child process.
///
/// Handle fields are plain (not behind a lock): each is only ever used for
/// one syscall family (`output_read` for `ReadFile`/`PeekNamedPipe`,
/// `input_write` for `WriteFile`, `process.hProcess` for wait/terminate),
/// and Win32 handles tolerate concurrent use by different threads for
/// different operations. Only the two pieces of state this wrapper itself
/// mutates (the recorded exit code and the idempotent-close flag) need
/// synchronization.
pub struct ConPtyBackend {
    hpc: HPCON,
    input_write: HANDLE,
    output_read: HANDLE,
    process: PROCESS_INFORMATION,
    exit_code: Mutex<Option<i32>>,
    closed: AtomicBool,
}

// HPCON is a raw pointer, so the struct doesn't get Send/Sync for free. All
// of its fields are either Copy handle values or behind a lock.
unsafe impl Send for ConPtyBackend {}
unsafe impl Sync for ConPtyBackend {}

impl ConPtyBackend {
    pub fn spawn(size: PtySize, command: &[String], cwd: &Path) -> Result<Self> {
        unsafe { Self::spawn_internal(size, command, cwd) }
    }

    unsafe fn spawn_internal(size: PtySize, command: &[String], cwd: &Path) -> Result<Self> {
        let mut pty_input_read: HANDLE = 0;
        let mut pty_input_write: HANDLE = 0;
        let mut pty_output_read: HANDLE = 0;
        let mut pty_output_write: HANDLE = 0;

        if CreatePipe(&mut pty_input_read, &mut pty_input_write, std::ptr::null(), 0) == 0 {
            return Err(last_error("CreatePipe(input)"));
        }
        if CreatePipe(&mut pty_output_read, &mut pty_output_write, std::ptr::null(), 0) == 0 {
            CloseHandle(pty_input_read);
            CloseHandle(pty_input_write);
            return Err(last_error("CreatePipe(output)"));
        }

        let coord = COORD { X: size.cols as i16, Y: size.rows as i16 };
        let mut hpc: HPCON = std::ptr::null_mut();
        let hr = CreatePseudoConsole(coord, pty_input_read, pty_output_write, 0, &mut hpc);
        // Whichever handles ConPTY now owns are closed in the parent regardless
        // of success: the pseudo-console duplicates what it needs internally.
        CloseHandle(pty_input_read);
        CloseHandle(pty_output_write);
        if hr != 0 {
            CloseHandle(pty_input_write);
            CloseHandle(pty_output_read);
            return Err(DaemonError::System(format!("CreatePseudoConsole failed: hresult {}", hr)));
        }

        let mut attr_list_size: usize = 0;
        InitializeProcThreadAttributeList(std::ptr::null_mut(), 1, 0, &mut attr_list_size);

        let mut attr_list_buffer = vec![0u8; attr_list_size];
        let attr_list = attr_list_buffer.as_mut_ptr() as LPPROC_THREAD_ATTRIBUTE_LIST;

        if InitializeProcThreadAttributeList(attr_list, 1, 0, &mut attr_list_size) == 0 {
            ClosePseudoConsole(hpc);
            CloseHandle(pty_input_write);
            CloseHandle(pty_output_read);
            return Err(last_error("InitializeProcThreadAttributeList"));
        }

        if UpdateProcThreadAttribute(
            attr_list,
            0,
            PROC_THREAD_ATTRIBUTE_PSEUDOCONSOLE,
            hpc as *const _,
            std::mem::size_of::<HPCON>(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        ) == 0
        {
            DeleteProcThreadAttributeList(attr_list);
            ClosePseudoConsole(hpc);
            CloseHandle(pty_input_write);
            CloseHandle(pty_output_read);
            return Err(last_error("UpdateProcThreadAttribute"));
        }

        let mut startup_info: STARTUPINFOEXW = std::mem::zeroed();
        startup_info.StartupInfo.cb = std::mem::size_of::<STARTUPINFOEXW>() as u32;
        startup_info.lpAttributeList = attr_list;

        let mut cmd_wide: Vec<u16> = build_command_line(command)
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();
        let mut cwd_wide: Vec<u16> = cwd.to_string_lossy().encode_utf16().chain(std::iter::once(0)).collect();

        let mut process_info: PROCESS_INFORMATION = std::mem::zeroed();
        let created = CreateProcessW(
            std::ptr::null(),
            cmd_wide.as_mut_ptr(),
            std::ptr::null(),
            std::ptr::null(),
            0,
            EXTENDED_STARTUPINFO_PRESENT,
            std::ptr::null(),
            cwd_wide.as_mut_ptr(),
            &startup_info.StartupInfo,
            &mut process_info,
        );

        DeleteProcThreadAttributeList(attr_list);

        if created == 0 {
            ClosePseudoConsole(hpc);
            CloseHandle(pty_input_write);
            CloseHandle(pty_output_read);
            return Err(last_error("CreateProcessW"));
        }

        CloseHandle(process_info.hThread);

        Ok(ConPtyBackend {
            hpc,
            input_write: pty_input_write,
            output_read: pty_output_read,
            process: process_info,
            exit_code: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    fn process_has_exited(&self) -> bool {
        let waited = unsafe { WaitForSingleObject(self.process.hProcess, 0) };
        if waited != WAIT_OBJECT_0 {
            return false;
        }
        let mut code: u32 = 0;
        if unsafe { GetExitCodeProcess(self.process.hProcess, &mut code) } != 0 {
            *self.exit_code.lock().expect("exit code mutex poisoned") = Some(code as i32);
        }
        true
    }
}

impl PtyBackend for ConPtyBackend {
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let mut available: u32 = 0;
            let peeked = unsafe {
                PeekNamedPipe(
                    self.output_read,
                    std::ptr::null_mut(),
                    0,
                    std::ptr::null_mut(),
                    &mut available,
                    std::ptr::null_mut(),
                )
            };
            if peeked == 0 {
                return Err(last_error("PeekNamedPipe"));
            }

            if available > 0 {
                let to_read = (available as usize).min(buf.len()) as u32;
                let mut read: u32 = 0;
                let ok = unsafe { ReadFile(self.output_read, buf.as_mut_ptr(), to_read, &mut read, std::ptr::null_mut()) };
                if ok == 0 {
                    return Err(last_error("ReadFile"));
                }
                return Ok(read as usize);
            }

            if self.process_has_exited() {
                return Err(DaemonError::ChildExited);
            }

            std::thread::sleep(PTY_POLL_INTERVAL);
        }
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        let mut written: u32 = 0;
        let ok = unsafe { WriteFile(self.input_write, data.as_ptr(), data.len() as u32, &mut written, std::ptr::null_mut()) };
        if ok == 0 {
            return Err(last_error("WriteFile"));
        }
        if written as usize != data.len() {
            return Err(DaemonError::System(format!(
                "short write: wrote {} of {} bytes",
                written,
                data.len()
            )));
        }
        Ok(written as usize)
    }

    fn resize(&self, size: PtySize) -> Result<()> {
        let coord = COORD { X: size.cols as i16, Y: size.rows as i16 };
        let hr = unsafe { ResizePseudoConsole(self.hpc, coord) };
        if hr != 0 {
            return Err(DaemonError::System(format!("ResizePseudoConsole failed: hresult {}", hr)));
        }
        Ok(())
    }

    fn wait(&self) -> Result<()> {
        unsafe {
            WaitForSingleObject(self.process.hProcess, u32::MAX);
        }
        let mut code: u32 = 0;
        if unsafe { GetExitCodeProcess(self.process.hProcess, &mut code) } != 0 {
            *self.exit_code.lock().expect("exit code mutex poisoned") = Some(code as i32);
        }
        Ok(())
    }

    fn exit_code(&self) -> Option<i32> {
        *self.exit_code.lock().expect("exit code mutex poisoned")
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        unsafe {
            ClosePseudoConsole(self.hpc);
            if !self.process_has_exited() {
                windows_sys::Win32::System::Threading::TerminateProcess(self.process.hProcess, 1);
            }
            WaitForSingleObject(self.process.hProcess, 0);
            CloseHandle(self.input_write);
            CloseHandle(self.output_read);
            CloseHandle(self.process.hProcess);
        }
    }
}

impl Drop for ConPtyBackend {
    fn drop(&mut self) {
        self.close();
    }
}

/// Join a command + args into a single Win32 command-line string, quoting
/// any token that contains whitespace.
fn build_command_line(command: &[String]) -> String {
    command
        .iter()
        .map(|tok| if tok.contains(' ') { format!("\"{}\"", tok) } else { tok.clone() })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_quotes_tokens_with_spaces() {
        let cmd = vec!["C:\\Program Files\\pwsh.exe".to_string(), "-NoLogo".to_string()];
        assert_eq!(build_command_line(&cmd), "\"C:\\Program Files\\pwsh.exe\" -NoLogo");
    }

    #[test]
    fn command_line_leaves_plain_tokens_alone() {
        let cmd = vec!["cmd.exe".to_string(), "/c".to_string(), "dir".to_string()];
        assert_eq!(build_command_line(&cmd), "cmd.exe /c dir");
    }
}
