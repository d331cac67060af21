//! Tray icon, menu, resume notifications and the countdown window.
//!
//! Everything here runs on one dedicated thread that owns the Win32 message
//! pump. Per-window state hangs off `GWLP_USERDATA` of the hidden main window;
//! the countdown window borrows the same pointer.

use std::cell::Cell;
use std::collections::VecDeque;
use std::ptr::{null, null_mut};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use idlenap_shared::{CountdownInput, MenuChecks};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use windows_sys::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows_sys::Win32::Graphics::Gdi::{COLOR_BTNFACE, DEFAULT_GUI_FONT, GetStockObject, HBRUSH};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::EnableWindow;
use windows_sys::Win32::UI::Shell::{
    NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NOTIFYICONDATAW, Shell_NotifyIconW,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, CreateWindowExW, DefWindowProcW, DestroyMenu, DestroyWindow,
    DispatchMessageW, GWLP_USERDATA, GetCursorPos, GetMessageW, GetSystemMetrics,
    GetWindowLongPtrW, HMENU, IDC_ARROW, IDI_APPLICATION, LoadCursorW, LoadIconW, MB_ICONERROR,
    MB_ICONINFORMATION, MB_OK, MB_SETFOREGROUND, MB_TOPMOST, MESSAGEBOX_STYLE, MF_CHECKED,
    MF_SEPARATOR, MF_STRING, MSG, MessageBoxW, PostMessageW, PostQuitMessage, RegisterClassW,
    RegisterWindowMessageW, SM_CXSCREEN, SM_CYSCREEN, SW_SHOW, SendMessageW, SetForegroundWindow,
    SetWindowLongPtrW, SetWindowTextW, ShowWindow, TPM_BOTTOMALIGN, TPM_RIGHTBUTTON,
    TrackPopupMenu, TranslateMessage, WM_APP, WM_CLOSE, WM_COMMAND, WM_CONTEXTMENU, WM_DESTROY,
    WM_LBUTTONDBLCLK, WM_NCDESTROY, WM_NULL, WM_POWERBROADCAST, WM_RBUTTONUP, WM_SETFONT,
    WNDCLASSW, WS_CAPTION, WS_CHILD, WS_EX_DLGMODALFRAME, WS_EX_TOPMOST, WS_OVERLAPPED, WS_POPUP,
    WS_SYSMENU, WS_TABSTOP, WS_VISIBLE,
};

use super::{copy_wide, wide};
use crate::AppError;
use crate::app::{APP_NAME, MENU_LAYOUT, MenuCommand, Shell, ShellCommand, UiEvent};

const MAIN_CLASS: &str = "idlenap_tray";
const COUNTDOWN_CLASS: &str = "idlenap_countdown";

const WM_TRAY: u32 = WM_APP + 1;
const WM_AGENT: u32 = WM_APP + 2;
const TRAY_UID: u32 = 1;

const ID_CANCEL: usize = 201;
const ID_NOW: usize = 202;

const PBT_APMRESUMECRITICAL: usize = 0x6;
const PBT_APMRESUMESUSPEND: usize = 0x7;
const PBT_APMRESUMEAUTOMATIC: usize = 0x12;

const BS_PUSHBUTTON: u32 = 0x0;
const BS_DEFPUSHBUTTON: u32 = 0x1;
const SS_LEFT: u32 = 0x0;

const DIALOG_W: i32 = 460;
const DIALOG_H: i32 = 270;

type Queue = Arc<Mutex<VecDeque<ShellCommand>>>;

/// Agent-side handle: queue a command, then wake the pump.
pub struct TrayShell {
    hwnd: usize,
    queue: Queue,
}

impl Shell for TrayShell {
    fn post(&self, cmd: ShellCommand) {
        match self.queue.lock() {
            Ok(mut q) => q.push_back(cmd),
            Err(_) => {
                warn!("shell queue poisoned; dropping command");
                return;
            }
        }
        if unsafe { PostMessageW(self.hwnd as HWND, WM_AGENT, 0, 0) } == 0 {
            debug!("shell window gone; command not delivered");
        }
    }
}

struct ShellState {
    events: UnboundedSender<UiEvent>,
    queue: Queue,
    hinstance: HINSTANCE,
    main: Cell<HWND>,
    checks: Cell<MenuChecks>,
    dialog: Cell<HWND>,
    label: Cell<HWND>,
    closing_dialog: Cell<bool>,
    taskbar_created: u32,
}

impl ShellState {
    fn send(&self, ev: UiEvent) {
        if self.events.send(ev).is_err() {
            debug!(?ev, "agent gone; dropping ui event");
        }
    }
}

fn state_of<'a>(hwnd: HWND) -> Option<&'a ShellState> {
    let ptr = unsafe { GetWindowLongPtrW(hwnd, GWLP_USERDATA) } as *const ShellState;
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { &*ptr })
    }
}

/// Starts the shell thread and waits until its window exists.
pub fn spawn(events: UnboundedSender<UiEvent>) -> Result<Arc<TrayShell>, AppError> {
    let queue: Queue = Arc::default();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel();
    let thread_queue = queue.clone();
    std::thread::Builder::new()
        .name("idlenap-shell".into())
        .spawn(move || run_shell(events, thread_queue, ready_tx))
        .map_err(AppError::Io)?;
    let hwnd = ready_rx
        .recv()
        .map_err(|_| AppError::Platform("shell thread exited during startup".into()))?
        .map_err(AppError::Platform)?;
    Ok(Arc::new(TrayShell { hwnd, queue }))
}

fn register_classes(hinstance: HINSTANCE) -> Result<(), String> {
    let main_class = wide(MAIN_CLASS);
    let countdown_class = wide(COUNTDOWN_CLASS);
    unsafe {
        let cursor = LoadCursorW(null_mut(), IDC_ARROW);
        let background = (COLOR_BTNFACE + 1) as usize as HBRUSH;
        let main = WNDCLASSW {
            style: 0,
            lpfnWndProc: Some(main_proc),
            cbClsExtra: 0,
            cbWndExtra: 0,
            hInstance: hinstance,
            hIcon: null_mut(),
            hCursor: cursor,
            hbrBackground: null_mut(),
            lpszMenuName: null(),
            lpszClassName: main_class.as_ptr(),
        };
        if RegisterClassW(&main) == 0 {
            return Err("RegisterClassW failed for the tray window".into());
        }
        let countdown = WNDCLASSW {
            lpfnWndProc: Some(countdown_proc),
            hbrBackground: background,
            lpszClassName: countdown_class.as_ptr(),
            ..main
        };
        if RegisterClassW(&countdown) == 0 {
            return Err("RegisterClassW failed for the countdown window".into());
        }
    }
    Ok(())
}

fn run_shell(events: UnboundedSender<UiEvent>, queue: Queue, ready: Sender<Result<usize, String>>) {
    let hinstance: HINSTANCE = unsafe { GetModuleHandleW(null()) };
    if hinstance.is_null() {
        let _ = ready.send(Err("GetModuleHandleW returned NULL".into()));
        return;
    }
    if let Err(e) = register_classes(hinstance) {
        let _ = ready.send(Err(e));
        return;
    }

    let taskbar_created = unsafe { RegisterWindowMessageW(wide("TaskbarCreated").as_ptr()) };
    let state = Box::new(ShellState {
        events,
        queue,
        hinstance,
        main: Cell::new(null_mut()),
        checks: Cell::new(MenuChecks::default()),
        dialog: Cell::new(null_mut()),
        label: Cell::new(null_mut()),
        closing_dialog: Cell::new(false),
        taskbar_created,
    });

    let class_name = wide(MAIN_CLASS);
    let title = wide(APP_NAME);
    let hwnd = unsafe {
        CreateWindowExW(
            0,
            class_name.as_ptr(),
            title.as_ptr(),
            WS_OVERLAPPED,
            0,
            0,
            0,
            0,
            null_mut(),
            null_mut(),
            hinstance,
            null(),
        )
    };
    if hwnd.is_null() {
        let _ = ready.send(Err("CreateWindowExW failed for the tray window".into()));
        return;
    }
    state.main.set(hwnd);
    let state_ptr = Box::into_raw(state);
    unsafe { SetWindowLongPtrW(hwnd, GWLP_USERDATA, state_ptr as isize) };

    if !add_tray_icon(hwnd) {
        warn!("Shell_NotifyIconW failed; tray icon missing");
    }
    let _ = ready.send(Ok(hwnd as usize));
    info!("tray shell started");

    let mut msg: MSG = unsafe { core::mem::zeroed() };
    loop {
        let r = unsafe { GetMessageW(&mut msg, null_mut(), 0, 0) };
        if r > 0 {
            unsafe {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        } else if r == 0 {
            debug!("GetMessageW received WM_QUIT; shell exiting");
            break;
        } else {
            warn!("GetMessageW failed; shell exiting");
            break;
        }
    }

    // The window is destroyed and its user data cleared by now.
    drop(unsafe { Box::from_raw(state_ptr) });
}

fn add_tray_icon(hwnd: HWND) -> bool {
    unsafe {
        let mut nid: NOTIFYICONDATAW = core::mem::zeroed();
        nid.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        nid.hWnd = hwnd;
        nid.uID = TRAY_UID;
        nid.uFlags = NIF_MESSAGE | NIF_ICON | NIF_TIP;
        nid.uCallbackMessage = WM_TRAY;
        nid.hIcon = LoadIconW(null_mut(), IDI_APPLICATION);
        copy_wide(&mut nid.szTip, APP_NAME);
        Shell_NotifyIconW(NIM_ADD, &nid) != 0
    }
}

fn remove_tray_icon(hwnd: HWND) {
    unsafe {
        let mut nid: NOTIFYICONDATAW = core::mem::zeroed();
        nid.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        nid.hWnd = hwnd;
        nid.uID = TRAY_UID;
        Shell_NotifyIconW(NIM_DELETE, &nid);
    }
}

extern "system" fn main_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let Some(state) = state_of(hwnd) else {
        return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
    };
    match msg {
        WM_TRAY => {
            match (lparam as u32) & 0xFFFF {
                WM_LBUTTONDBLCLK => state.send(UiEvent::Menu(MenuCommand::OpenSettings)),
                WM_RBUTTONUP | WM_CONTEXTMENU => show_menu(hwnd, state),
                _ => {}
            }
            0
        }
        WM_COMMAND => {
            if let Some(cmd) = MenuCommand::from_id((wparam & 0xFFFF) as u16) {
                state.send(UiEvent::Menu(cmd));
            }
            0
        }
        WM_POWERBROADCAST => {
            if matches!(
                wparam,
                PBT_APMRESUMEAUTOMATIC | PBT_APMRESUMESUSPEND | PBT_APMRESUMECRITICAL
            ) {
                debug!(event = wparam, "resume broadcast");
                state.send(UiEvent::Resumed);
            }
            1
        }
        WM_AGENT => {
            drain_commands(hwnd, state);
            0
        }
        WM_DESTROY => {
            close_countdown(state);
            remove_tray_icon(hwnd);
            state.send(UiEvent::ShellClosed);
            unsafe { PostQuitMessage(0) };
            0
        }
        WM_NCDESTROY => unsafe {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
            DefWindowProcW(hwnd, msg, wparam, lparam)
        },
        m if m == state.taskbar_created && m != 0 => {
            // Explorer restarted; the icon has to be added again.
            add_tray_icon(hwnd);
            0
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

fn drain_commands(hwnd: HWND, state: &ShellState) {
    loop {
        let next = match state.queue.lock() {
            Ok(mut q) => q.pop_front(),
            Err(_) => None,
        };
        let Some(cmd) = next else {
            break;
        };
        match cmd {
            ShellCommand::OpenCountdown {
                title,
                detail,
                remaining,
            } => open_countdown(state, &title, &detail, remaining),
            ShellCommand::UpdateCountdown(remaining) => set_remaining(state, remaining),
            ShellCommand::CloseCountdown => close_countdown(state),
            ShellCommand::SetChecks(checks) => state.checks.set(checks),
            ShellCommand::Info { title, message } => {
                message_box(hwnd, &title, &message, MB_OK | MB_ICONINFORMATION)
            }
            ShellCommand::Alert { title, message } => message_box(
                hwnd,
                &title,
                &message,
                MB_OK | MB_ICONERROR | MB_SETFOREGROUND | MB_TOPMOST,
            ),
            ShellCommand::Quit => {
                unsafe { DestroyWindow(hwnd) };
                break;
            }
        }
    }
}

fn message_box(owner: HWND, title: &str, message: &str, style: MESSAGEBOX_STYLE) {
    let text = wide(message);
    let caption = wide(title);
    unsafe { MessageBoxW(owner, text.as_ptr(), caption.as_ptr(), style) };
}

fn show_menu(hwnd: HWND, state: &ShellState) {
    unsafe {
        let menu: HMENU = CreatePopupMenu();
        if menu.is_null() {
            warn!("CreatePopupMenu failed");
            return;
        }
        let checks = state.checks.get();
        let labels: Vec<(Option<MenuCommand>, Vec<u16>)> = MENU_LAYOUT
            .iter()
            .map(|item| (*item, item.map(|c| wide(c.label())).unwrap_or_default()))
            .collect();
        for (item, label) in &labels {
            match item {
                None => {
                    AppendMenuW(menu, MF_SEPARATOR, 0, null());
                }
                Some(cmd) => {
                    let mut flags = MF_STRING;
                    if cmd.checked(&checks) == Some(true) {
                        flags |= MF_CHECKED;
                    }
                    AppendMenuW(menu, flags, usize::from(cmd.id()), label.as_ptr());
                }
            }
        }
        let mut pt = POINT { x: 0, y: 0 };
        GetCursorPos(&mut pt);
        SetForegroundWindow(hwnd);
        TrackPopupMenu(
            menu,
            TPM_RIGHTBUTTON | TPM_BOTTOMALIGN,
            pt.x,
            pt.y,
            0,
            hwnd,
            null(),
        );
        PostMessageW(hwnd, WM_NULL, 0, 0);
        DestroyMenu(menu);
    }
}

fn child(
    state: &ShellState,
    parent: HWND,
    class: &str,
    text: &str,
    style: u32,
    rect: (i32, i32, i32, i32),
    id: usize,
) -> HWND {
    let class = wide(class);
    let text = wide(text);
    unsafe {
        let hwnd = CreateWindowExW(
            0,
            class.as_ptr(),
            text.as_ptr(),
            WS_CHILD | WS_VISIBLE | style,
            rect.0,
            rect.1,
            rect.2,
            rect.3,
            parent,
            id as HMENU,
            state.hinstance,
            null(),
        );
        if !hwnd.is_null() {
            SendMessageW(hwnd, WM_SETFONT, GetStockObject(DEFAULT_GUI_FONT) as usize, 1);
        }
        hwnd
    }
}

fn remaining_text(remaining: u32) -> String {
    format!("Hibernating in {remaining} s")
}

fn open_countdown(state: &ShellState, title: &str, detail: &str, remaining: u32) {
    close_countdown(state);
    let owner = state.main.get();
    let class = wide(COUNTDOWN_CLASS);
    let caption = wide(title);
    let dialog = unsafe {
        let x = (GetSystemMetrics(SM_CXSCREEN) - DIALOG_W) / 2;
        let y = (GetSystemMetrics(SM_CYSCREEN) - DIALOG_H) / 2;
        CreateWindowExW(
            WS_EX_TOPMOST | WS_EX_DLGMODALFRAME,
            class.as_ptr(),
            caption.as_ptr(),
            WS_POPUP | WS_CAPTION | WS_SYSMENU,
            x,
            y,
            DIALOG_W,
            DIALOG_H,
            owner,
            null_mut(),
            state.hinstance,
            null(),
        )
    };
    if dialog.is_null() {
        warn!("countdown window could not be created; cancelling countdown");
        state.send(UiEvent::Countdown(CountdownInput::WindowClosed));
        return;
    }
    unsafe { SetWindowLongPtrW(dialog, GWLP_USERDATA, state as *const ShellState as isize) };

    let inner_w = DIALOG_W - 40;
    child(state, dialog, "STATIC", detail, SS_LEFT, (16, 14, inner_w, 120), 0);
    let label = child(
        state,
        dialog,
        "STATIC",
        &remaining_text(remaining),
        SS_LEFT,
        (16, 142, inner_w, 22),
        0,
    );
    child(
        state,
        dialog,
        "BUTTON",
        "Cancel hibernate",
        BS_DEFPUSHBUTTON | WS_TABSTOP,
        (16, 178, 190, 32),
        ID_CANCEL,
    );
    child(
        state,
        dialog,
        "BUTTON",
        "Hibernate now",
        BS_PUSHBUTTON | WS_TABSTOP,
        (16 + inner_w - 190, 178, 190, 32),
        ID_NOW,
    );

    state.dialog.set(dialog);
    state.label.set(label);
    unsafe {
        EnableWindow(owner, 0);
        ShowWindow(dialog, SW_SHOW);
        SetForegroundWindow(dialog);
    }
    debug!(remaining, "countdown window opened");
}

fn set_remaining(state: &ShellState, remaining: u32) {
    let label = state.label.get();
    if label.is_null() {
        return;
    }
    let text = wide(&remaining_text(remaining));
    unsafe { SetWindowTextW(label, text.as_ptr()) };
}

fn close_countdown(state: &ShellState) {
    let dialog = state.dialog.replace(null_mut());
    state.label.set(null_mut());
    if dialog.is_null() {
        return;
    }
    state.closing_dialog.set(true);
    unsafe { DestroyWindow(dialog) };
    state.closing_dialog.set(false);
    reenable_owner(state);
    debug!("countdown window closed");
}

fn reenable_owner(state: &ShellState) {
    let owner = state.main.get();
    unsafe {
        EnableWindow(owner, 1);
        SetForegroundWindow(owner);
    }
}

extern "system" fn countdown_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let Some(state) = state_of(hwnd) else {
        return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
    };
    match msg {
        WM_COMMAND => {
            match wparam & 0xFFFF {
                ID_CANCEL => state.send(UiEvent::Countdown(CountdownInput::Cancel)),
                ID_NOW => state.send(UiEvent::Countdown(CountdownInput::HibernateNow)),
                _ => {}
            }
            0
        }
        WM_CLOSE => {
            // The agent decides; it answers with CloseCountdown.
            state.send(UiEvent::Countdown(CountdownInput::WindowClosed));
            0
        }
        WM_DESTROY => {
            if !state.closing_dialog.get() && state.dialog.get() == hwnd {
                state.dialog.set(null_mut());
                state.label.set(null_mut());
                reenable_owner(state);
                state.send(UiEvent::Countdown(CountdownInput::WindowClosed));
            }
            0
        }
        WM_NCDESTROY => unsafe {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
            DefWindowProcW(hwnd, msg, wparam, lparam)
        },
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}
