use anyhow::{bail, Result};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

/// Read the master password, in order of preference:
/// environment variable, piped stdin, interactive prompt.
///
///  KEYFORT_PASSWORD="secret" keyfort list
///  echo "secret" | keyfort list
pub fn read_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var("KEYFORT_PASSWORD") {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    if !io::stdin().is_terminal() {
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        let pw = buf.trim_end().to_string();

        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    if io::stdin().is_terminal() {
        let pw = rpassword::prompt_password("Master password: ")?;
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    bail!("No password provided")
}

/// Read a new password twice and require both entries to match.
pub fn read_new_password_with_confirmation(prompt: &str) -> Result<Zeroizing<String>> {
    if !io::stdin().is_terminal() {
        let stdin = io::stdin();
        let mut handle = stdin.lock();

        let mut pw1 = Zeroizing::new(String::new());
        let mut pw2 = Zeroizing::new(String::new());

        handle.read_line(&mut pw1)?;
        handle.read_line(&mut pw2)?;

        trim_newline(&mut pw1);
        trim_newline(&mut pw2);

        if pw1.is_empty() {
            bail!("password cannot be empty");
        }
        if *pw1 != *pw2 {
            bail!("passwords do not match");
        }

        return Ok(pw1);
    }

    let pw1 = rpassword::prompt_password(format!("{prompt}: "))?;
    let pw2 = rpassword::prompt_password(format!("Confirm {}: ", prompt.to_lowercase()))?;

    if pw1.is_empty() {
        bail!("password cannot be empty");
    }
    if pw1 != pw2 {
        bail!("passwords do not match");
    }

    Ok(Zeroizing::new(pw1))
}

/// Password protecting an import/export file, as opposed to the vault's
/// master password. Env var first so scripted use works.
pub fn read_file_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var("KEYFORT_FILE_PASSWORD") {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    if io::stdin().is_terminal() {
        let pw = rpassword::prompt_password("File password: ")?;
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    bail!("No file password provided")
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
