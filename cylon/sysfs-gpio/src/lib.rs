//! GPIO lines through the Linux sysfs interface (`/sys/class/gpio`).
//!
//! A line is exported when it is opened, unless the kernel already exposes its
//! directory, and unexported again when it is dropped. Only lines exported by
//! this crate are unexported.

#![warn(missing_docs)]

use std::{
    fs::{self, File, OpenOptions},
    io,
    os::unix::fs::FileExt as _,
    path::{Path, PathBuf},
};

/// Default location of the sysfs GPIO class.
pub const DEFAULT_ROOT: &str = "/sys/class/gpio";

/// Errors raised while driving a sysfs GPIO line.
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    /// Writing the pin number to `export` failed.
    #[error("failed to export gpio {pin}")]
    Export {
        /// GPIO number.
        pin: u32,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Configuring the direction of the line failed.
    #[error("failed to set direction of gpio {pin}")]
    Direction {
        /// GPIO number.
        pin: u32,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Writing the line value failed.
    #[error("failed to write value of gpio {pin}")]
    Write {
        /// GPIO number.
        pin: u32,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Reading the line value failed.
    #[error("failed to read value of gpio {pin}")]
    Read {
        /// GPIO number.
        pin: u32,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The `value` attribute held something other than `0` or `1`.
    #[error("gpio {pin} reported unexpected value {value:?}")]
    InvalidValue {
        /// GPIO number.
        pin: u32,
        /// Raw byte read from the attribute.
        value: u8,
    },
}

/// Handle on a sysfs GPIO class directory.
#[derive(Debug, Clone)]
pub struct Chip {
    root: PathBuf,
}

impl Chip {
    /// Uses `root` instead of [`DEFAULT_ROOT`]. Mostly useful for tests.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens `pin` as an output, driven to `initial` as part of setting the
    /// direction so the line never glitches.
    pub fn output(&self, pin: u32, initial: bool) -> Result<OutputLine, GpioError> {
        let export = Export::acquire(&self.root, pin)?;
        let direction = if initial { "high" } else { "low" };
        fs::write(export.attribute("direction"), direction)
            .map_err(|source| GpioError::Direction { pin, source })?;
        let value = OpenOptions::new()
            .read(true)
            .write(true)
            .open(export.attribute("value"))
            .map_err(|source| GpioError::Write { pin, source })?;
        tracing::debug!(pin, initial, "gpio output line ready");

        Ok(OutputLine {
            value,
            export,
        })
    }

    /// Opens `pin` as an input.
    pub fn input(&self, pin: u32) -> Result<InputLine, GpioError> {
        let export = Export::acquire(&self.root, pin)?;
        fs::write(export.attribute("direction"), "in")
            .map_err(|source| GpioError::Direction { pin, source })?;
        let value = File::open(export.attribute("value"))
            .map_err(|source| GpioError::Read { pin, source })?;
        tracing::debug!(pin, "gpio input line ready");

        Ok(InputLine { value, export })
    }
}

impl Default for Chip {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

/// Tracks whether we exported a line and must give it back.
#[derive(Debug)]
struct Export {
    root: PathBuf,
    pin: u32,
    owned: bool,
}

impl Export {
    fn acquire(root: &Path, pin: u32) -> Result<Self, GpioError> {
        let owned = !root.join(format!("gpio{pin}")).exists();
        if owned {
            fs::write(root.join("export"), pin.to_string())
                .map_err(|source| GpioError::Export { pin, source })?;
        }

        Ok(Self {
            root: root.to_owned(),
            pin,
            owned,
        })
    }

    fn attribute(&self, name: &str) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin)).join(name)
    }
}

impl Drop for Export {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        if let Err(err) = fs::write(self.root.join("unexport"), self.pin.to_string())
        {
            tracing::warn!(pin = self.pin, "failed to unexport gpio: {err}");
        }
    }
}

/// A GPIO line configured as an output.
#[derive(Debug)]
pub struct OutputLine {
    value: File,
    // Dropped last, after the value file is closed.
    export: Export,
}

impl OutputLine {
    /// GPIO number of the line.
    pub fn pin(&self) -> u32 {
        self.export.pin
    }

    /// Drives the line high or low.
    pub fn set(&mut self, high: bool) -> Result<(), GpioError> {
        let byte: &[u8] = if high { b"1" } else { b"0" };
        self.value
            .write_all_at(byte, 0)
            .map_err(|source| GpioError::Write {
                pin: self.pin(),
                source,
            })?;

        Ok(())
    }
}

/// A GPIO line configured as an input.
#[derive(Debug)]
pub struct InputLine {
    value: File,
    export: Export,
}

impl InputLine {
    /// GPIO number of the line.
    pub fn pin(&self) -> u32 {
        self.export.pin
    }

    /// Samples the line.
    pub fn is_high(&self) -> Result<bool, GpioError> {
        let pin = self.pin();
        let mut byte = [0_u8; 1];
        let read = self
            .value
            .read_at(&mut byte, 0)
            .map_err(|source| GpioError::Read { pin, source })?;
        if read == 0 {
            return Err(GpioError::Read {
                pin,
                source: io::ErrorKind::UnexpectedEof.into(),
            });
        }
        match byte[0] {
            b'0' => Ok(false),
            b'1' => Ok(true),
            value => Err(GpioError::InvalidValue { pin, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Lays out what the kernel would after exporting `pins`.
    fn fake_sysfs(pins: &[u32]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for pin in pins {
            let line = dir.path().join(format!("gpio{pin}"));
            fs::create_dir(&line).unwrap();
            fs::write(line.join("direction"), "in\n").unwrap();
            fs::write(line.join("value"), "0\n").unwrap();
        }
        dir
    }

    fn read(dir: &TempDir, pin: u32, attribute: &str) -> String {
        fs::read_to_string(dir.path().join(format!("gpio{pin}")).join(attribute))
            .unwrap()
    }

    #[test]
    fn test_output_sets_direction_and_value() {
        let dir = fake_sysfs(&[65]);
        let chip = Chip::new(dir.path());

        let mut line = chip.output(65, false).unwrap();
        assert_eq!(read(&dir, 65, "direction"), "low");

        line.set(true).unwrap();
        assert!(read(&dir, 65, "value").starts_with('1'));

        line.set(false).unwrap();
        assert!(read(&dir, 65, "value").starts_with('0'));
    }

    #[test]
    fn test_already_exported_line_is_left_exported() {
        let dir = fake_sysfs(&[46]);
        let chip = Chip::new(dir.path());

        drop(chip.output(46, true).unwrap());

        assert_eq!(read(&dir, 46, "direction"), "high");
        assert!(!dir.path().join("export").exists());
        assert!(!dir.path().join("unexport").exists());
    }

    #[test]
    fn test_missing_line_is_exported_then_released_on_failure() {
        let dir = fake_sysfs(&[]);
        let chip = Chip::new(dir.path());

        // Nothing creates the line directory, so setting the direction fails
        // after the export went through.
        let err = chip.output(26, false).unwrap_err();
        assert!(matches!(err, GpioError::Direction { pin: 26, .. }), "{err:?}");

        let exported = fs::read_to_string(dir.path().join("export")).unwrap();
        let unexported = fs::read_to_string(dir.path().join("unexport")).unwrap();
        assert_eq!(exported, "26");
        assert_eq!(unexported, "26");
    }

    #[test]
    fn test_input_reads_level() {
        let dir = fake_sysfs(&[27]);
        let chip = Chip::new(dir.path());
        let line = chip.input(27).unwrap();
        assert_eq!(read(&dir, 27, "direction"), "in");
        assert_eq!(line.pin(), 27);

        assert!(!line.is_high().unwrap());
        fs::write(dir.path().join("gpio27/value"), "1\n").unwrap();
        assert!(line.is_high().unwrap());
    }

    #[test]
    fn test_input_rejects_garbage() {
        let dir = fake_sysfs(&[61]);
        let chip = Chip::new(dir.path());
        let line = chip.input(61).unwrap();

        fs::write(dir.path().join("gpio61/value"), "x\n").unwrap();
        let err = line.is_high().unwrap_err();
        assert!(
            matches!(err, GpioError::InvalidValue { pin: 61, value: b'x' }),
            "{err:?}"
        );
    }
}
