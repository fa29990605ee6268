use std::fs;
use std::io;
use std::path::Path;

use tempfile::NamedTempFile;

/// Temp file in `dest`'s directory, ready to be persisted over `dest`.
///
/// New files get the usual `0o666 & !umask` mode; when `dest` already exists
/// its permissions are carried over so a rewrite never changes who can read it.
pub fn temp_file_beside(dest: &Path) -> io::Result<NamedTempFile> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(".label_ocr");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let tmp = builder.tempfile_in(dir)?;

    if let Ok(meta) = fs::metadata(dest) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    Ok(tmp)
}
