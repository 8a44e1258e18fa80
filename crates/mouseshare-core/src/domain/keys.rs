//! Emergency-key policy for the input interceptor.
//!
//! While the primary is suppressing local input, a stuck capture must never
//! lock the user out of their own machine. The keys classified here are
//! always delivered to the local OS regardless of the suppress state, and
//! CTRL+ALT+ESC additionally forces suppress off as a panic release.

/// Windows virtual-key codes the policy needs. The wire carries `vk` values
/// verbatim, so these constants apply on both hosts.
pub const VK_TAB: u32 = 0x09;
pub const VK_SHIFT: u32 = 0x10;
pub const VK_CONTROL: u32 = 0x11;
pub const VK_MENU: u32 = 0x12; // Alt
pub const VK_ESCAPE: u32 = 0x1B;
pub const VK_DELETE: u32 = 0x2E;
pub const VK_LWIN: u32 = 0x5B;
pub const VK_RWIN: u32 = 0x5C;
pub const VK_F4: u32 = 0x73;
pub const VK_F8: u32 = 0x77;
pub const VK_SCROLL: u32 = 0x91; // Scroll Lock
pub const VK_LSHIFT: u32 = 0xA0;
pub const VK_RSHIFT: u32 = 0xA1;
pub const VK_LCONTROL: u32 = 0xA2;
pub const VK_RCONTROL: u32 = 0xA3;
pub const VK_LMENU: u32 = 0xA4;
pub const VK_RMENU: u32 = 0xA5;

/// Returns `true` for keys the interceptor must always pass through to the
/// local OS, suppress state notwithstanding.
///
/// The set covers the CTRL+ALT+DELETE chord and its component keys, Scroll
/// Lock (the panic toggle), the configured user toggle key, the Windows
/// keys, CTRL+SHIFT+ESC, ALT+TAB, ALT+F4, and CTRL+ALT+ESC.
pub fn is_emergency_key(vk: u32, ctrl_down: bool, alt_down: bool, user_toggle_vk: u32) -> bool {
    // Modifier keys themselves are never blocked; holding one hostage would
    // break every rescue chord below.
    if matches!(vk, VK_CONTROL | VK_LCONTROL | VK_RCONTROL) {
        return true;
    }
    if matches!(vk, VK_MENU | VK_LMENU | VK_RMENU) {
        return true;
    }
    if vk == VK_DELETE {
        return true;
    }
    if vk == VK_SCROLL || vk == user_toggle_vk {
        return true;
    }
    if vk == VK_LWIN || vk == VK_RWIN {
        return true;
    }
    // CTRL+SHIFT+ESC (task manager) and CTRL+ALT+ESC both match here.
    if vk == VK_ESCAPE && ctrl_down {
        return true;
    }
    if vk == VK_TAB && alt_down {
        return true;
    }
    if vk == VK_F4 && alt_down {
        return true;
    }
    false
}

/// Returns `true` for the CTRL+ALT+ESC chord that forces suppress off.
pub fn is_panic_release(vk: u32, ctrl_down: bool, alt_down: bool) -> bool {
    vk == VK_ESCAPE && ctrl_down && alt_down
}

// ── Tests ─────────────────────────────────────────────────────────────────────
