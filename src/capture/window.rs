//! Window discovery by process executable name.

use anyhow::{anyhow, Result};
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use windows::Win32::Foundation::{BOOL, HANDLE, HWND, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetWindowRect, GetWindowTextLengthW, GetWindowThreadProcessId,
    IsWindowVisible,
};

/// Finds the first visible, titled top-level window whose process executable
/// is exactly `process_name` (case-insensitive).
///
/// Returns an error if no such window exists, i.e. the game is not running.
pub fn find_window_by_process(process_name: &str) -> Result<HWND> {
    struct EnumData {
        target: String,
        hwnd: Option<HWND>,
    }

    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let data = &mut *(lparam.0 as *mut EnumData);

            if !IsWindowVisible(hwnd).as_bool() {
                return TRUE;
            }
            // Untitled windows are tool windows, not the game's main window
            if GetWindowTextLengthW(hwnd) == 0 {
                return TRUE;
            }

            let mut process_id: u32 = 0;
            GetWindowThreadProcessId(hwnd, Some(&mut process_id));
            if process_id == 0 {
                return TRUE;
            }

            let Some(name) = process_image_name(process_id) else {
                return TRUE;
            };
            log::debug!("  [{}] {}", process_id, name);

            // Exact match: "MapleStory.exe" but not "MapleStoryLauncher.exe"
            if name.to_lowercase() == data.target {
                data.hwnd = Some(hwnd);
                return BOOL(0); // Stop enumeration
            }

            TRUE
        }
    }

    log::info!("Searching for {} window...", process_name);
    let mut data = EnumData {
        target: process_name.to_lowercase(),
        hwnd: None,
    };
    unsafe {
        // EnumWindows reports FALSE when the callback stops it early; that is the success path
        let _ = EnumWindows(Some(enum_callback), LPARAM(&mut data as *mut _ as isize));
    }

    data.hwnd
        .ok_or_else(|| anyhow!("Could not find {} window. Is the game running?", process_name))
}

/// Executable file name of a process, without its directory.
unsafe fn process_image_name(process_id: u32) -> Option<String> {
    unsafe {
        let handle: HANDLE =
            OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id).ok()?;

        let mut name_buf: Vec<u16> = vec![0; 1024];
        let mut len = name_buf.len() as u32;
        let result = QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            windows::core::PWSTR(name_buf.as_mut_ptr()),
            &mut len,
        );
        let _ = windows::Win32::Foundation::CloseHandle(handle);

        if result.is_err() || len == 0 {
            return None;
        }

        let full_path = OsString::from_wide(&name_buf[..len as usize])
            .to_string_lossy()
            .to_string();
        full_path.rsplit('\\').next().map(str::to_string)
    }
}

/// Gets the client area rectangle and its offset relative to the window origin.
///
/// Captured frames include the title bar and borders; the offset is where the
/// client area's top-left corner sits inside the full window.
pub fn get_client_area_info(hwnd: HWND) -> Result<(RECT, POINT)> {
    let mut client_rect = RECT::default();
    unsafe { GetClientRect(hwnd, &mut client_rect)? };

    let mut client_origin = POINT { x: 0, y: 0 };
    unsafe {
        if !ClientToScreen(hwnd, &mut client_origin).as_bool() {
            return Err(anyhow!("ClientToScreen failed"));
        }
    }

    let mut window_rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut window_rect)? };

    let offset = POINT {
        x: client_origin.x - window_rect.left,
        y: client_origin.y - window_rect.top,
    };

    Ok((client_rect, offset))
}
