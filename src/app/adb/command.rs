//! Builds the adb command lines handed to the host shell.
//!
//! Quoting follows POSIX `sh` rules: arguments made only of safe characters are
//! passed bare, everything else is single-quoted.

pub const KEYCODE_ENTER: u32 = 66;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdbCommand {
    program: String,
    serial: Option<String>,
}

impl AdbCommand {
    pub fn new(program: impl Into<String>, serial: Option<&str>) -> Self {
        Self {
            program: program.into(),
            serial: serial
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn base(&self) -> String {
        let mut line = quote_host_arg(&self.program);
        if let Some(serial) = &self.serial {
            line.push_str(" -s ");
            line.push_str(&quote_host_arg(serial));
        }
        line
    }

    /// Long listing, so model/product/transport columns come back too.
    pub fn devices(&self) -> String {
        format!("{} devices -l", self.base())
    }

    pub fn install(&self, apk_path: &str) -> String {
        format!("{} install {}", self.base(), quote_host_arg(apk_path))
    }

    pub fn uninstall(&self, package: &str) -> String {
        format!("{} uninstall {}", self.base(), quote_host_arg(package))
    }

    /// Package listing filtered on the host, as `pm list packages | grep`.
    pub fn list_packages_matching(&self, package: &str) -> String {
        format!(
            "{} shell pm list packages | grep -F {}",
            self.base(),
            quote_host_arg(package)
        )
    }

    pub fn start_activity(&self, component: &str) -> String {
        format!("{} shell am start -n {}", self.base(), quote_host_arg(component))
    }

    pub fn pidof(&self, package: &str) -> String {
        format!("{} shell pidof {}", self.base(), quote_host_arg(package))
    }

    pub fn input_text(&self, text: &str) -> String {
        format!(
            "{} shell input text {}",
            self.base(),
            quote_host_arg(&encode_input_text(text))
        )
    }

    pub fn keyevent(&self, keycode: u32) -> String {
        format!("{} shell input keyevent {keycode}", self.base())
    }

    pub fn count_entries(&self, device_dir: &str) -> String {
        format!(
            "{} shell ls {} 2>/dev/null | wc -l",
            self.base(),
            quote_host_arg(device_dir)
        )
    }

    pub fn processes_matching(&self, package: &str) -> String {
        format!("{} shell ps | grep -F {}", self.base(), quote_host_arg(package))
    }

    pub fn screencap_to(&self, host_path: &str) -> String {
        format!(
            "{} exec-out screencap -p > {}",
            self.base(),
            quote_host_arg(host_path)
        )
    }
}

pub fn quote_host_arg(value: &str) -> String {
    if !value.is_empty() && value.chars().all(is_shell_safe) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '@' | '%' | '+' | ',')
}

/// Encodes text for `input text`: spaces become `%s` and characters the
/// device shell would interpret are backslash-escaped.
pub fn encode_input_text(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' => encoded.push_str("%s"),
            '\\' | '$' | '&' | '|' | ';' | '<' | '>' | '(' | ')' | '\'' | '"' | '`' | '*'
            | '~' | '?' | '!' | '#' | '[' | ']' | '{' | '}' => {
                encoded.push('\\');
                encoded.push(c);
            }
            _ => encoded.push(c),
        }
    }
    encoded
}
