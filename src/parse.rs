//! Helper macros for parsing packed structs.
//!
//! The format is pretty much like `bincode` for structs:
//! fields are read back to back in declaration order, in the
//! byte order chosen at runtime by the caller.
use anyhow::{anyhow, Result};
use byteordered::{byteorder::ReadBytesExt, ByteOrdered, Endian, Endianness};

/// Declare [`Parseable`] structs.
///
/// A make-do for a derive macro. Supports only simple structs
/// without generics. A field may be converted after reading
/// with `name => u32 as usize`.
macro_rules! declare_parseable_structs {
    (
        $(
            $(#[$smeta:meta])*
            $svis:vis struct $sname:ident {
                $($fvis:vis $name:ident => $ty:ty $(as $ty2:ty)?),* $(,)?
            }
        )*
    ) => {
        $(
            $(#[$smeta])* #[allow(dead_code)]
            $svis struct $sname {
                $($fvis $name: declaration_type!($ty $(as $ty2)?)),*
            }

            impl crate::parse::Parseable for $sname {
                type Error = anyhow::Error;
                fn parse<T, E>(
                    r: &mut byteordered::ByteOrdered<T, E>,
                ) -> std::result::Result<Self, Self::Error>
                where
                    T: byteordered::byteorder::ReadBytesExt,
                    E: byteordered::Endian,
                {
                    $(
                        let $name = anyhow::Context::with_context(
                            <$ty as crate::parse::Parseable>::parse(r),
                            || format!("parsing field `{}.{}`", stringify!($sname), stringify!($name)),
                        )? $(as $ty2)?;
                    )*
                    Ok($sname { $($name),* })
                }
            }
        )*
    };
}

/// Helper macro that expands to the parsed type or the
/// converted type.
macro_rules! declaration_type {
    ($ty:ty as $ty2:ty) => {
        $ty2
    };
    ($ty:ty) => {
        $ty
    };
}

pub(crate) trait Parseable: Sized {
    type Error;
    fn parse<T: ReadBytesExt, E: Endian>(r: &mut ByteOrdered<T, E>) -> Result<Self, Self::Error>;
}

/// Parse a `P` starting `offset` bytes into `data`.
pub(crate) fn parse_at<P>(data: &[u8], offset: usize, endianness: Endianness) -> Result<P>
where
    P: Parseable,
    P::Error: Into<anyhow::Error>,
{
    let slice = data.get(offset..).ok_or_else(|| {
        anyhow!(
            "offset {:#x} is beyond the end of the data ({} bytes)",
            offset,
            data.len()
        )
    })?;
    P::parse(&mut ByteOrdered::runtime(slice, endianness)).map_err(Into::into)
}

use std::{error::Error, io::Error as IOError};
macro_rules! impl_parseable {
    ($ty:ty, $method:ident) => {
        impl Parseable for $ty {
            type Error = IOError;
            fn parse<T: ReadBytesExt, E: Endian>(
                r: &mut ByteOrdered<T, E>,
            ) -> Result<Self, IOError> {
                r.$method()
            }
        }
    };
}

impl_parseable!(u8, read_u8);
impl_parseable!(u16, read_u16);
impl_parseable!(i16, read_i16);
impl_parseable!(u32, read_u32);
impl_parseable!(i32, read_i32);
impl_parseable!(f32, read_f32);

impl<Ty, const N: usize> Parseable for [Ty; N]
where
    Ty: Parseable,
    <Ty as Parseable>::Error: Send + Sync + Error + 'static,
    [Ty; N]: Default,
{
    type Error = anyhow::Error;
    fn parse<T: ReadBytesExt, E: Endian>(r: &mut ByteOrdered<T, E>) -> Result<Self, Self::Error> {
        let mut out: [Ty; N] = Default::default();
        for item in out.iter_mut() {
            *item = Ty::parse(r)?;
        }
        Ok(out)
    }
}
