//! Desktop side effects: opening targets, dialogs and error notifications.
//! Every tool is optional; a missing one just makes its feature unavailable.

use log::{debug, warn};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::resolver::{Choice, Chooser, DirectoryPicker, Opener};

/// Extra chooser entry that leads to the folder picker.
pub const BROWSE_ENTRY: &str = "Browse for a folder...";

pub struct SystemOpener;

impl Opener for SystemOpener {
    fn open(&self, target: &str) -> bool {
        let tool = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
        debug!("Running {} {}", tool, target);
        match Command::new(tool).arg(target).stdin(Stdio::null()).status() {
            Ok(status) => status.success(),
            Err(e) => {
                warn!("Cannot run {}: {}", tool, e);
                false
            }
        }
    }
}

/// AppleScript list chooser. Arguments are title, prompt, then the entries;
/// dismissing the list exits non-zero.
const OSASCRIPT_CHOOSE: &str = "on run argv
  set r to choose from list (items 3 thru -1 of argv) with title (item 1 of argv) with prompt (item 2 of argv)
  if r is false then error number -128
  return item 1 of r
end run";

/// AppleScript folder picker, prompt as the only argument.
const OSASCRIPT_PICK_FOLDER: &str = "on run argv
  return POSIX path of (choose folder with prompt (item 1 of argv))
end run";

fn osascript(bin: &Path, script: &str) -> Command {
    let mut cmd = Command::new(bin);
    cmd.arg("-e").arg(script);
    cmd
}

#[derive(Debug, Clone)]
pub enum Dialog {
    Osascript(PathBuf),
    Zenity(PathBuf),
    Kdialog(PathBuf),
    Terminal,
}

impl Dialog {
    /// First available of osascript (macOS only), zenity, kdialog, then the
    /// terminal when stdin is interactive (or `force_terminal` is set).
    pub fn detect(force_terminal: bool) -> Option<Self> {
        if cfg!(target_os = "macos") {
            if let Ok(p) = which::which("osascript") {
                return Some(Dialog::Osascript(p));
            }
        }
        if let Ok(p) = which::which("zenity") {
            return Some(Dialog::Zenity(p));
        }
        if let Ok(p) = which::which("kdialog") {
            return Some(Dialog::Kdialog(p));
        }
        (force_terminal || io::stdin().is_terminal()).then_some(Dialog::Terminal)
    }
}

/// Run a dialog and return its trimmed stdout, or `None` when it was
/// dismissed or could not start.
fn dialog_output(cmd: &mut Command) -> Option<String> {
    let out = match cmd.stdin(Stdio::null()).stderr(Stdio::null()).output() {
        Ok(o) => o,
        Err(e) => {
            warn!("Dialog failed to start: {}", e);
            return None;
        }
    };
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8_lossy(&out.stdout).trim_end_matches(['\r', '\n']).to_string();
    (!s.is_empty()).then_some(s)
}

fn read_line(prompt: &str) -> Option<String> {
    eprint!("{}", prompt);
    io::stderr().flush().ok()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).ok()?;
    let line = line.trim().to_string();
    (!line.is_empty()).then_some(line)
}

impl Chooser for Dialog {
    fn choose(&self, title: &str, prompt: &str, candidates: &[String]) -> Choice {
        let answer = match self {
            Dialog::Osascript(bin) => dialog_output(
                osascript(bin, OSASCRIPT_CHOOSE)
                    .args([title, prompt])
                    .args(candidates)
                    .arg(BROWSE_ENTRY),
            ),
            Dialog::Zenity(bin) => dialog_output(
                Command::new(bin)
                    .args(["--list", "--width=640", "--height=420"])
                    .arg(format!("--title={}", title))
                    .arg(format!("--text={}", prompt))
                    .arg("--column=Folder")
                    .args(candidates)
                    .arg(BROWSE_ENTRY),
            ),
            Dialog::Kdialog(bin) => {
                let mut cmd = Command::new(bin);
                cmd.args(["--title", title, "--menu", prompt]);
                for c in candidates {
                    cmd.args([c, c]);
                }
                cmd.args([BROWSE_ENTRY, BROWSE_ENTRY]);
                dialog_output(&mut cmd)
            }
            Dialog::Terminal => {
                eprintln!("{}\n{}", title, prompt);
                for (i, c) in candidates.iter().enumerate() {
                    eprintln!("  {}) {}", i + 1, c);
                }
                eprintln!("  b) {}", BROWSE_ENTRY);
                read_line("Number, path, or empty to cancel: ").map(|s| {
                    match s.parse::<usize>() {
                        Ok(n) if (1..=candidates.len()).contains(&n) => candidates[n - 1].clone(),
                        _ if s.eq_ignore_ascii_case("b") => BROWSE_ENTRY.to_string(),
                        _ => s,
                    }
                })
            }
        };
        match answer {
            None => Choice::Cancelled,
            Some(a) if a == BROWSE_ENTRY => Choice::Manual,
            Some(a) => Choice::Selected(a),
        }
    }
}

impl DirectoryPicker for Dialog {
    fn pick_directory(&self, title: &str) -> Option<String> {
        match self {
            Dialog::Osascript(bin) => {
                dialog_output(osascript(bin, OSASCRIPT_PICK_FOLDER).arg(title))
            }
            Dialog::Zenity(bin) => dialog_output(
                Command::new(bin)
                    .args(["--file-selection", "--directory"])
                    .arg(format!("--title={}", title)),
            ),
            Dialog::Kdialog(bin) => dialog_output(
                Command::new(bin)
                    .args(["--title", title, "--getexistingdirectory"])
                    .arg(dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"))),
            ),
            Dialog::Terminal => read_line(&format!("{}\nFolder: ", title)),
        }
    }
}

/// Report an error to the user: always on stderr, and as a desktop
/// notification when a notifier is installed.
pub fn show_error(message: &str) {
    eprintln!("open_lnk: {}", message);

    let mut cmd = if cfg!(target_os = "macos") {
        let Ok(bin) = which::which("osascript") else {
            return;
        };
        let script = format!(
            "display notification {:?} with title \"open_lnk\"",
            message
        );
        let mut c = Command::new(bin);
        c.arg("-e").arg(script);
        c
    } else if let Ok(bin) = which::which("notify-send") {
        let mut c = Command::new(bin);
        c.args(["--app-name=open_lnk", "open_lnk", message]);
        c
    } else if let Ok(bin) = which::which("zenity") {
        let mut c = Command::new(bin);
        c.args(["--error", "--title=open_lnk"]).arg(format!("--text={}", message));
        c
    } else if let Ok(bin) = which::which("kdialog") {
        let mut c = Command::new(bin);
        c.args(["--title", "open_lnk", "--error", message]);
        c
    } else {
        return;
    };

    if let Err(e) = cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).status() {
        debug!("Notification failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn osascript_gets_scripts_and_arguments_in_order() {
        let bin = PathBuf::from("/usr/bin/osascript");
        let mut cmd = osascript(&bin, OSASCRIPT_CHOOSE);
        cmd.args(["Locate", "Pick one"]).arg(BROWSE_ENTRY);
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args[0], "-e");
        assert!(args[1].contains("choose from list (items 3 thru -1 of argv)"));
        assert_eq!(&args[2..], ["Locate", "Pick one", BROWSE_ENTRY]);

        let cmd = osascript(&bin, OSASCRIPT_PICK_FOLDER);
        let args: Vec<_> = cmd.get_args().collect();
        assert!(args[1].to_string_lossy().contains("POSIX path of (choose folder"));
        assert_eq!(cmd.get_program(), bin.as_os_str());
    }

    #[test]
    fn dialogs_fail_closed() {
        assert_eq!(dialog_output(&mut Command::new("/nonexistent/dialog")), None);
        assert_eq!(
            dialog_output(Command::new("/bin/sh").args(["-c", "exit 1"])),
            None
        );
        assert_eq!(
            dialog_output(Command::new("/bin/sh").args(["-c", "echo /Volumes/Data/"])),
            Some("/Volumes/Data/".to_string())
        );
    }
}
