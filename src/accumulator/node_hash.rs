//! [AccumulatorHash] is the hash type every node of a [Forest](super::forest::Forest) or
//! [Pollard](super::pollard::Pollard) carries. [BitcoinNodeHash] is the default
//! implementation: leaves are opaque 32-byte commitments, and a parent is the SHA-512/256 of
//! its two children concatenated. Using a different function than the one that commits to
//! leaves keeps parent hashes from ever being confused with leaf hashes.
//!
//! # Examples
//! Building from a str
//! ```
//! use std::str::FromStr;
//!
//! use utreexo::accumulator::node_hash::BitcoinNodeHash;
//! let hash = BitcoinNodeHash::from_str(
//!     "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d",
//! )
//! .unwrap();
//! assert_eq!(
//!     hash.to_string().as_str(),
//!     "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d"
//! );
//! ```
//!
//! Computing a parent hash
//! ```
//! use std::str::FromStr;
//!
//! use utreexo::accumulator::node_hash::AccumulatorHash;
//! use utreexo::accumulator::node_hash::BitcoinNodeHash;
//! let left = BitcoinNodeHash::new([0; 32]);
//! let right = BitcoinNodeHash::new([1; 32]);
//! let parent = BitcoinNodeHash::parent_hash(&left, &right);
//! let expected_parent = BitcoinNodeHash::from_str(
//!     "34e33ca0c40b7bd33d28932ca9e35170def7309a3bf91ecda5e1ceb067548a12",
//! )
//! .unwrap();
//! assert_eq!(parent, expected_parent);
//! ```
use std::fmt::Debug;
use std::fmt::Display;
use std::ops::Deref;
use std::str::FromStr;

use bitcoin_hashes::hex;
use bitcoin_hashes::sha256;
use bitcoin_hashes::sha512_256;
use bitcoin_hashes::Hash;
use bitcoin_hashes::HashEngine;
#[cfg(feature = "with-serde")]
use serde::Deserialize;
#[cfg(feature = "with-serde")]
use serde::Serialize;

/// Everything the accumulators need from a node hash.
pub trait AccumulatorHash:
    Copy + Clone + Ord + Debug + Display + std::hash::Hash + Default + Send + Sync + 'static
{
    /// Whether this is the marker for a slot that holds nothing.
    fn is_empty(&self) -> bool;
    fn empty() -> Self;
    fn parent_hash(left: &Self, right: &Self) -> Self;
    fn write<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: std::io::Write;
    fn read<R>(reader: &mut R) -> std::io::Result<Self>
    where
        R: std::io::Read;
}

/// A 32 byte hash of a node in the forest, or the empty marker.
/// # Example
/// ```
/// use utreexo::accumulator::node_hash::BitcoinNodeHash;
/// let hash = BitcoinNodeHash::new([0; 32]);
/// assert_eq!(
///     hash.to_string().as_str(),
///     "0000000000000000000000000000000000000000000000000000000000000000"
/// );
/// ```
#[derive(Eq, PartialEq, Copy, Clone, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
pub enum BitcoinNodeHash {
    #[default]
    Empty,
    Some([u8; 32]),
}

impl Deref for BitcoinNodeHash {
    type Target = [u8; 32];

    fn deref(&self) -> &Self::Target {
        match self {
            BitcoinNodeHash::Some(ref inner) => inner,
            BitcoinNodeHash::Empty => &[0; 32],
        }
    }
}

impl Display for BitcoinNodeHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BitcoinNodeHash::Some(inner) => {
                for byte in inner.iter() {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            BitcoinNodeHash::Empty => write!(f, "empty"),
        }
    }
}

impl Debug for BitcoinNodeHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<sha512_256::Hash> for BitcoinNodeHash {
    fn from(hash: sha512_256::Hash) -> Self {
        BitcoinNodeHash::Some(hash.to_byte_array())
    }
}

impl From<sha256::Hash> for BitcoinNodeHash {
    fn from(hash: sha256::Hash) -> Self {
        BitcoinNodeHash::Some(hash.to_byte_array())
    }
}

impl From<[u8; 32]> for BitcoinNodeHash {
    fn from(hash: [u8; 32]) -> Self {
        BitcoinNodeHash::Some(hash)
    }
}

impl From<&[u8; 32]> for BitcoinNodeHash {
    fn from(hash: &[u8; 32]) -> Self {
        BitcoinNodeHash::Some(*hash)
    }
}

impl TryFrom<&str> for BitcoinNodeHash {
    type Error = hex::HexToArrayError;
    fn try_from(hash: &str) -> Result<Self, Self::Error> {
        let inner = hex::FromHex::from_hex(hash)?;
        Ok(BitcoinNodeHash::Some(inner))
    }
}

impl FromStr for BitcoinNodeHash {
    type Err = hex::HexToArrayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BitcoinNodeHash::try_from(s)
    }
}

impl BitcoinNodeHash {
    /// Creates a new hash from a 32 byte array.
    pub fn new(inner: [u8; 32]) -> Self {
        BitcoinNodeHash::Some(inner)
    }
}

impl AccumulatorHash for BitcoinNodeHash {
    fn is_empty(&self) -> bool {
        matches!(self, BitcoinNodeHash::Empty)
    }

    fn empty() -> Self {
        BitcoinNodeHash::Empty
    }

    /// parent_hash return the merkle parent of the two passed in nodes.
    fn parent_hash(left: &Self, right: &Self) -> Self {
        let mut hash = sha512_256::Hash::engine();
        hash.input(&**left);
        hash.input(&**right);
        sha512_256::Hash::from_engine(hash).into()
    }

    /// Writes a one byte tag, followed by the 32 bytes if the hash isn't empty.
    fn write<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: std::io::Write,
    {
        match self {
            Self::Empty => writer.write_all(&[0]),
            Self::Some(hash) => {
                writer.write_all(&[2])?;
                writer.write_all(hash)
            }
        }
    }

    fn read<R>(reader: &mut R) -> std::io::Result<Self>
    where
        R: std::io::Read,
    {
        let mut tag = [0];
        reader.read_exact(&mut tag)?;
        match tag {
            [0] => Ok(Self::Empty),
            [2] => {
                let mut hash = [0; 32];
                reader.read_exact(&mut hash)?;
                Ok(Self::Some(hash))
            }
            [_] => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "unexpected tag for AccumulatorHash",
            )),
        }
    }
}
