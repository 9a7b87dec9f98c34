/// Global toggle hotkey using a low-level Windows keyboard hook (`WH_KEYBOARD_LL`).
///
/// The hook runs on a dedicated OS thread with its own message pump, so the
/// toggle works even while a full-screen game has focus. Each press of the
/// configured key sends [`AgentEvent::ToggleRequested`] stamped with the press time.
///
/// On non-Windows platforms the public API compiles but is a no-op at runtime.
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::AgentEvent;

/// Currently bound virtual-key code (0 = disabled).
static TOGGLE_VK: AtomicU32 = AtomicU32::new(0);

/// Channel into the agent loop. Set once by [`start`].
static TOGGLE_TX: OnceLock<mpsc::Sender<AgentEvent>> = OnceLock::new();

/// Converts a key name (`"F9"`, `"P"`, `"7"`) to a Windows virtual-key code.
///
/// Accepts `F1`–`F12` and single ASCII letters or digits, case-insensitively.
pub fn parse_vk(name: &str) -> Option<u32> {
    let upper = name.trim().to_uppercase();
    if let Some(n) = upper.strip_prefix('F').and_then(|d| d.parse::<u32>().ok()) {
        // VK_F1 = 0x70 … VK_F12 = 0x7B
        return (1..=12).contains(&n).then_some(0x6F + n);
    }
    let mut chars = upper.chars();
    match (chars.next(), chars.next()) {
        // Letters and digits map to their uppercase ASCII codes.
        (Some(c), None) if c.is_ascii_alphanumeric() => Some(c as u32),
        _ => None,
    }
}

/// Handle to the running hook; rebinds the key on config reload and stops the thread.
pub struct HotkeyHandle {
    #[cfg(windows)]
    thread: std::thread::JoinHandle<()>,
    /// Thread ID of the message-pump thread, used to post `WM_QUIT`.
    #[cfg(windows)]
    thread_id: u32,
}

impl HotkeyHandle {
    /// Binds the toggle to `key_name`; an empty or unknown name disables it.
    pub fn update_key(&self, key_name: &str) {
        let vk = parse_vk(key_name);
        if vk.is_none() && !key_name.trim().is_empty() {
            warn!("unknown hotkey {key_name:?}; toggle hotkey disabled");
        }
        TOGGLE_VK.store(vk.unwrap_or(0), Ordering::Relaxed);
    }

    /// Signals the hook thread to stop and waits for it.
    pub fn stop(self) {
        #[cfg(windows)]
        {
            imp::post_quit(self.thread_id);
            let _ = self.thread.join();
        }
    }
}

/// Installs the keyboard hook on its own thread.
///
/// Returns `None` if the hook thread could not be started; the agent keeps
/// running without a hotkey in that case.
pub fn start(initial_key: &str, tx: mpsc::Sender<AgentEvent>) -> Option<HotkeyHandle> {
    // Ignored if called twice (e.g. in test binaries).
    let _ = TOGGLE_TX.set(tx);

    #[cfg(windows)]
    let handle = {
        let (id_tx, id_rx) = std::sync::mpsc::sync_channel::<u32>(1);
        let thread = match std::thread::Builder::new()
            .name("hotkey-pump".into())
            .spawn(move || imp::run_message_pump(id_tx))
        {
            Ok(t) => t,
            Err(e) => {
                warn!("failed to spawn hotkey thread: {e}");
                return None;
            }
        };
        let thread_id = match id_rx.recv() {
            Ok(id) => id,
            Err(_) => {
                warn!("hotkey thread exited before installing the hook");
                return None;
            }
        };
        HotkeyHandle { thread, thread_id }
    };

    #[cfg(not(windows))]
    let handle = HotkeyHandle {};

    handle.update_key(initial_key);
    debug!("toggle hotkey bound to {initial_key:?}");
    Some(handle)
}

#[cfg(windows)]
mod imp {
    use std::sync::atomic::Ordering;
    use std::sync::mpsc as std_mpsc;
    use std::time::Instant;
    use tracing::{debug, error};

    use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
        UnhookWindowsHookEx, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL, WM_KEYDOWN, WM_QUIT,
    };

    use super::{TOGGLE_TX, TOGGLE_VK};
    use crate::event::AgentEvent;

    unsafe extern "system" fn keyboard_proc(
        n_code: i32,
        w_param: WPARAM,
        l_param: LPARAM,
    ) -> LRESULT {
        if n_code >= 0 && w_param.0 as u32 == WM_KEYDOWN {
            let kb = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
            let target = TOGGLE_VK.load(Ordering::Relaxed);
            if target != 0 && kb.vkCode == target {
                if let Some(tx) = TOGGLE_TX.get() {
                    // Never block the hook; a full channel drops the press.
                    let _ = tx.try_send(AgentEvent::ToggleRequested(Instant::now()));
                }
            }
        }
        CallNextHookEx(None, n_code, w_param, l_param)
    }

    /// Installs `WH_KEYBOARD_LL` and pumps messages until `WM_QUIT`.
    /// Sends the thread ID first so the handle can post `WM_QUIT` later.
    pub fn run_message_pump(id_tx: std_mpsc::SyncSender<u32>) {
        unsafe {
            let hook = match SetWindowsHookExW(
                WH_KEYBOARD_LL,
                Some(keyboard_proc),
                HINSTANCE::default(),
                0,
            ) {
                Ok(h) => h,
                Err(e) => {
                    error!("SetWindowsHookExW failed: {e}");
                    return;
                }
            };
            let _ = id_tx.send(GetCurrentThreadId());
            drop(id_tx);

            let mut msg = MSG::default();
            // GetMessageW: >0 = message, 0 = WM_QUIT, <0 = error.
            while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
                DispatchMessageW(&msg);
            }

            let _ = UnhookWindowsHookEx(hook);
            debug!("hotkey thread exited");
        }
    }

    pub fn post_quit(thread_id: u32) {
        unsafe {
            let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
    }
}
