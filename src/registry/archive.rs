//! registry::archive
//!
//! Deterministic tar serialization of a tagged directory snapshot.
//!
//! # Format
//!
//! - Every entry carries the same modification time: the committer time of
//!   the tagged commit. Owner ids are zero and owner names empty.
//! - Directories are written before their contents, as `path/` with mode
//!   `0755`.
//! - Files keep the permission bits recorded in the snapshot (so the
//!   executable bit survives) and their exact size.
//! - Symbolic links are written as link entries.
//! - Submodules are omitted entirely.
//! - Siblings appear in the order the store lists them.
//!
//! The output is therefore a pure function of the snapshot and the commit
//! time, and two runs over the same tag produce identical bytes.
//!
//! # Failures
//!
//! A read failure anywhere in the walk aborts it. Bytes already handed to
//! the writer stay there, and no end-of-archive marker is written after the
//! failure, so a reader sees a truncated archive rather than a short but
//! apparently complete one.

use std::ffi::OsStr;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{EntryType, Header};
use tracing::debug;

use super::catalog::VersionCatalog;
use crate::core::types::Oid;
use crate::core::version::Version;
use crate::git::{EntryKind, ObjectStore, StoreError, TreeEntry};

/// Mode written for every directory entry.
const DIRECTORY_MODE: u32 = 0o755;

/// Permission bits kept from a file's recorded mode.
const PERMISSION_MASK: u32 = 0o7777;

/// Size of the name field in a tar header.
const NAME_FIELD_LEN: usize = 100;

/// Placeholder name of a GNU long-name entry.
const GNU_LONG_LINK: &[u8] = b"././@LongLink";

type Tar<W> = tar::Builder<Sealable<W>>;

/// Writes version archives from one module store.
pub struct ArchiveBuilder<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: ObjectStore + ?Sized> ArchiveBuilder<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Write the tar archive of the snapshot tagged for `version`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::RefNotFound`] if the version tag does not exist
    /// - [`StoreError::Write`] if `out` rejects a write
    /// - [`StoreError::Unarchivable`] if an entry has no tar representation
    /// - any other variant if part of the snapshot cannot be read
    ///
    /// On error, `out` may hold a truncated archive.
    pub fn write_version_archive<W: Write>(
        &self,
        version: &Version,
        out: W,
    ) -> Result<(), StoreError> {
        let commit = VersionCatalog::new(self.store).resolve_commit(version)?;
        // Timestamps before the epoch cannot be represented in a tar header.
        let mtime = u64::try_from(commit.committed_at).unwrap_or(0);

        let mut builder = tar::Builder::new(Sealable::new(out));
        match self.append_tree(&mut builder, commit.tree.oid(), b"", mtime) {
            Ok(()) => builder.finish().map_err(StoreError::Write),
            Err(err) => {
                // The builder writes its trailer when dropped; refuse it.
                builder.get_mut().seal();
                Err(err)
            }
        }
    }

    /// Write the gzip-compressed tar archive for `version`.
    ///
    /// The gzip stream is only finished when the archive is complete.
    pub fn write_version_tgz<W: Write>(&self, version: &Version, out: W) -> Result<W, StoreError> {
        let mut encoder = GzEncoder::new(Sealable::new(out), Compression::default());
        match self.write_version_archive(version, &mut encoder) {
            Ok(()) => Ok(encoder.finish().map_err(StoreError::Write)?.into_inner()),
            Err(err) => {
                // The encoder writes its footer when dropped; refuse it.
                encoder.get_mut().seal();
                Err(err)
            }
        }
    }

    fn append_tree<W: Write>(
        &self,
        builder: &mut Tar<W>,
        tree: &Oid,
        prefix: &[u8],
        mtime: u64,
    ) -> Result<(), StoreError> {
        for entry in self.store.read_tree(tree)? {
            let path = [prefix, entry.name.as_slice()].concat();
            match entry.kind {
                EntryKind::Directory => {
                    let mut dir = path;
                    dir.push(b'/');
                    append_directory(builder, &dir, mtime)?;
                    self.append_tree(builder, &entry.oid, &dir, mtime)?;
                }
                EntryKind::File => self.append_file(builder, &entry, &path, mtime)?,
                EntryKind::Symlink => self.append_symlink(builder, &entry, &path, mtime)?,
                EntryKind::Submodule => {
                    debug!(path = %String::from_utf8_lossy(&path), "skipping submodule");
                }
            }
        }
        Ok(())
    }

    fn append_file<W: Write>(
        &self,
        builder: &mut Tar<W>,
        entry: &TreeEntry,
        path: &[u8],
        mtime: u64,
    ) -> Result<(), StoreError> {
        let content = self.store.read_blob(&entry.oid)?;
        let mut header = header(
            EntryType::Regular,
            entry.mode & PERMISSION_MASK,
            content.len() as u64,
            mtime,
        );
        builder
            .append_data(&mut header, as_path(path), content.as_slice())
            .map_err(|err| classify(builder, path, err))
    }

    fn append_symlink<W: Write>(
        &self,
        builder: &mut Tar<W>,
        entry: &TreeEntry,
        path: &[u8],
        mtime: u64,
    ) -> Result<(), StoreError> {
        let target = self.store.read_blob(&entry.oid)?;
        let mut header = header(EntryType::Symlink, 0o777, 0, mtime);
        builder
            .append_link(&mut header, as_path(path), as_path(&target))
            .map_err(|err| classify(builder, path, err))
    }
}

/// Raw snapshot bytes as a filesystem path, without re-encoding.
fn as_path(bytes: &[u8]) -> &Path {
    Path::new(OsStr::from_bytes(bytes))
}

/// Attribute a failed append: to the output if the sink rejected a write,
/// otherwise to the entry being appended.
fn classify<W: Write>(builder: &Tar<W>, path: &[u8], err: io::Error) -> StoreError {
    if builder.get_ref().failed {
        StoreError::Write(err)
    } else {
        StoreError::Unarchivable {
            path: String::from_utf8_lossy(path).into_owned(),
            message: err.to_string(),
        }
    }
}

/// Append a directory entry whose name keeps its trailing slash.
///
/// `tar::Builder` normalizes paths through `Path::components`, which drops
/// the slash, so the name field is filled here instead. Names longer than
/// the field are carried in a preceding GNU long-name entry.
fn append_directory<W: Write>(
    builder: &mut Tar<W>,
    name: &[u8],
    mtime: u64,
) -> Result<(), StoreError> {
    let mut entry = header(EntryType::Directory, DIRECTORY_MODE, 0, mtime);

    if name.len() > NAME_FIELD_LEN {
        let mut long = header(EntryType::GNULongName, 0o644, name.len() as u64 + 1, mtime);
        long.as_old_mut().name[..GNU_LONG_LINK.len()].copy_from_slice(GNU_LONG_LINK);
        long.set_cksum();
        let mut data = name.to_vec();
        data.push(0);
        builder
            .append(&long, data.as_slice())
            .map_err(|err| classify(builder, name, err))?;
    }

    let field = &mut entry.as_old_mut().name;
    let len = name.len().min(NAME_FIELD_LEN);
    field[..len].copy_from_slice(&name[..len]);
    entry.set_cksum();
    builder
        .append(&entry, io::empty())
        .map_err(|err| classify(builder, name, err))
}

/// A header with everything but the path fixed.
fn header(kind: EntryType, mode: u32, size: u64, mtime: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(kind);
    header.set_mode(mode);
    header.set_size(size);
    header.set_mtime(mtime);
    header.set_uid(0);
    header.set_gid(0);
    header
}

/// Writer that rejects all further output once sealed, and remembers
/// whether the wrapped writer ever failed.
struct Sealable<W: Write> {
    inner: W,
    sealed: bool,
    failed: bool,
}

impl<W: Write> Sealable<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            sealed: false,
            failed: false,
        }
    }

    fn seal(&mut self) {
        self.sealed = true;
    }

    fn into_inner(self) -> W {
        self.inner
    }

    fn check(&self) -> io::Result<()> {
        if self.sealed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "archive aborted",
            ));
        }
        Ok(())
    }

    fn record<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if result.is_err() {
            self.failed = true;
        }
        result
    }
}

impl<W: Write> Write for Sealable<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        let result = self.inner.write(buf);
        self.record(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check()?;
        let result = self.inner.flush();
        self.record(result)
    }
}
