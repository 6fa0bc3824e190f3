//! Where the blocks served by the bridge come from.
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

use super::Error;

/// Raw blocks and their serialized proofs, by height. Heights start at 0.
pub trait BlockSource: Send + Sync + 'static {
    /// The last height we can serve, -1 if there's nothing.
    fn max_height(&self) -> i32;
    fn block_bytes(&self, height: i32) -> Result<Vec<u8>, Error>;
    fn proof_bytes(&self, height: i32) -> Result<Vec<u8>, Error>;
}

/// Reads `<height>.blk` and `<height>.proof` from a directory.
#[derive(Debug, Clone)]
pub struct DirBlockSource {
    datadir: PathBuf,
    max_height: i32,
}

impl DirBlockSource {
    /// Opens `datadir`. Without `max_height`, we serve every height from 0 up to the first one
    /// missing a file.
    pub fn open(datadir: impl Into<PathBuf>, max_height: Option<i32>) -> Result<Self, Error> {
        let datadir = datadir.into();
        if !datadir.is_dir() {
            return Err(Error::DataDirMissing(datadir));
        }

        let max_height = match max_height {
            Some(max_height) => max_height,
            None => {
                let mut height = 0;
                while block_path(&datadir, height).is_file() && proof_path(&datadir, height).is_file()
                {
                    height += 1;
                }
                height - 1
            }
        };
        debug!(datadir = %datadir.display(), max_height, "opened block directory");

        Ok(DirBlockSource {
            datadir,
            max_height,
        })
    }

    /// Stores a block and its proof in `datadir`, creating it if needed.
    pub fn write_block(datadir: &Path, height: i32, block: &[u8], proof: &[u8]) -> Result<(), Error> {
        fs::create_dir_all(datadir)?;
        fs::write(block_path(datadir, height), block)?;
        fs::write(proof_path(datadir, height), proof)?;
        Ok(())
    }

    pub fn datadir(&self) -> &Path {
        &self.datadir
    }
}

fn block_path(datadir: &Path, height: i32) -> PathBuf {
    datadir.join(format!("{height}.blk"))
}

fn proof_path(datadir: &Path, height: i32) -> PathBuf {
    datadir.join(format!("{height}.proof"))
}

fn read(path: &Path, height: i32) -> Result<Vec<u8>, Error> {
    if height < 0 {
        return Err(Error::BlockNotFound(height));
    }
    fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => Error::BlockNotFound(height),
        _ => Error::Io(err),
    })
}

impl BlockSource for DirBlockSource {
    fn max_height(&self) -> i32 {
        self.max_height
    }

    fn block_bytes(&self, height: i32) -> Result<Vec<u8>, Error> {
        read(&block_path(&self.datadir, height), height)
    }

    fn proof_bytes(&self, height: i32) -> Result<Vec<u8>, Error> {
        read(&proof_path(&self.datadir, height), height)
    }
}

/// Blocks kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlockSource {
    blocks: Vec<(Vec<u8>, Vec<u8>)>,
}

impl MemoryBlockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block at the next height.
    pub fn push(&mut self, block: Vec<u8>, proof: Vec<u8>) {
        self.blocks.push((block, proof));
    }

    fn get(&self, height: i32) -> Result<&(Vec<u8>, Vec<u8>), Error> {
        usize::try_from(height)
            .ok()
            .and_then(|height| self.blocks.get(height))
            .ok_or(Error::BlockNotFound(height))
    }
}

/// Height of the last of `len` blocks, saturating at what a request can name.
fn last_height(len: usize) -> i32 {
    i32::try_from(len).map_or(i32::MAX, |len| len - 1)
}

impl BlockSource for MemoryBlockSource {
    fn max_height(&self) -> i32 {
        last_height(self.blocks.len())
    }

    fn block_bytes(&self, height: i32) -> Result<Vec<u8>, Error> {
        Ok(self.get(height)?.0.clone())
    }

    fn proof_bytes(&self, height: i32) -> Result<Vec<u8>, Error> {
        Ok(self.get(height)?.1.clone())
    }
}

#[cfg(test)]
mod test {
    use super::last_height;
    use super::BlockSource;
    use super::DirBlockSource;
    use super::MemoryBlockSource;
    use crate::bridge::Error;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("utreexo-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_dir_source() {
        let dir = temp_dir("dir-source");
        for height in 0..3 {
            DirBlockSource::write_block(&dir, height, &[height as u8; 4], &[0; 16]).unwrap();
        }
        // A gap, 4 is never served
        DirBlockSource::write_block(&dir, 4, &[4; 4], &[0; 16]).unwrap();

        let source = DirBlockSource::open(&dir, None).unwrap();
        assert_eq!(source.max_height(), 2);
        assert_eq!(source.block_bytes(1).unwrap(), vec![1; 4]);
        assert_eq!(source.proof_bytes(2).unwrap(), vec![0; 16]);
        assert!(matches!(source.block_bytes(3), Err(Error::BlockNotFound(3))));
        assert!(matches!(source.block_bytes(-1), Err(Error::BlockNotFound(-1))));

        let source = DirBlockSource::open(&dir, Some(4)).unwrap();
        assert_eq!(source.max_height(), 4);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_datadir() {
        let dir = temp_dir("missing");
        assert!(matches!(
            DirBlockSource::open(&dir, None),
            Err(Error::DataDirMissing(_))
        ));
    }

    #[test]
    fn test_memory_source() {
        let mut source = MemoryBlockSource::new();
        assert_eq!(source.max_height(), -1);

        source.push(vec![1], vec![2]);
        assert_eq!(source.max_height(), 0);
        assert_eq!(source.block_bytes(0).unwrap(), vec![1]);
        assert_eq!(source.proof_bytes(0).unwrap(), vec![2]);
        assert!(matches!(source.proof_bytes(1), Err(Error::BlockNotFound(1))));
        assert!(matches!(source.proof_bytes(-3), Err(Error::BlockNotFound(-3))));
    }

    #[test]
    fn test_last_height() {
        assert_eq!(last_height(0), -1);
        assert_eq!(last_height(10), 9);
        assert_eq!(last_height(i32::MAX as usize), i32::MAX - 1);
        assert_eq!(last_height(i32::MAX as usize + 1), i32::MAX);
        assert_eq!(last_height(usize::MAX), i32::MAX);
    }
}
