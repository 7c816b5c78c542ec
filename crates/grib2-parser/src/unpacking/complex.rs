//! Complex packing (template 5.2) and complex packing with spatial
//! differencing (template 5.3).
//!
//! Data section layout: for 5.3, the first value(s) and the minimum of the
//! differences as sign-magnitude integers of `extra_descriptor_octets`
//! bytes; then the group references, widths and lengths, each block padded
//! to a byte boundary; then the packed values of every group.

use super::bits::{BitReader, MAX_PACKING_BITS};
use super::Scaler;
use crate::error::{Grib2Error, Result};
use crate::sections::{ComplexPacking, DataRepresentationView};

/// A decoded integer before scaling, or one of the two missing markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Packed {
    Value(i64),
    Missing,
}

pub(super) fn unpack(
    view: &DataRepresentationView<'_>,
    data: &[u8],
    count: usize,
) -> Result<Vec<Option<f32>>> {
    let params = view.simple()?;
    let complex = view.complex()?;
    let spatial = if view.template() == 3 {
        Some(view.spatial_differencing()?)
    } else {
        None
    };

    let nbits = params.bits_per_value;
    if nbits > MAX_PACKING_BITS {
        return Err(Grib2Error::UnsupportedPackingWidth { bits: nbits });
    }
    if complex.missing_value_management > 2 {
        return Err(Grib2Error::invalid_field(
            "missing_value_management",
            format!("unknown code {}", complex.missing_value_management),
        ));
    }

    let scaler = Scaler::new(&params);
    let ngroups = complex.group_count as usize;
    if ngroups == 0 {
        return Ok(vec![Some(scaler.constant()); count]);
    }
    if ngroups > count {
        return Err(Grib2Error::invalid_field(
            "group_count",
            format!("{ngroups} groups for {count} values"),
        ));
    }

    let mut reader = BitReader::new(data);

    // Spatial differencing descriptors.
    let mut first_values = Vec::new();
    let mut minimum = 0i64;
    if let Some(spatial) = spatial {
        if !(1..=2).contains(&spatial.order) {
            return Err(Grib2Error::invalid_field(
                "spatial_difference_order",
                format!("unsupported order {}", spatial.order),
            ));
        }
        let width = spatial.extra_descriptor_octets.saturating_mul(8);
        for _ in 0..spatial.order {
            first_values.push(reader.read_signed(width)?);
        }
        minimum = reader.read_signed(width)?;
    }

    let references = read_block(&mut reader, ngroups, nbits, 0, 1)?;
    let widths = read_block(
        &mut reader,
        ngroups,
        complex.group_width_bits,
        complex.group_width_reference as i64,
        1,
    )?;
    let mut lengths = read_block(
        &mut reader,
        ngroups,
        complex.group_length_bits,
        complex.group_length_reference as i64,
        complex.group_length_increment as i64,
    )?;
    lengths[ngroups - 1] = complex.last_group_length as i64;

    let total = lengths.iter().try_fold(0i64, |sum, &length| sum.checked_add(length));
    if total != Some(count as i64) {
        let covered = total.map_or_else(|| "too many".to_string(), |t| t.to_string());
        return Err(Grib2Error::invalid_field(
            "group lengths",
            format!("groups cover {covered} values, {count} expected"),
        ));
    }

    let values = read_groups(&mut reader, &complex, nbits, &references, &widths, &lengths, count)?;
    let values = match spatial {
        Some(spatial) => undo_differencing(values, spatial.order, &first_values, minimum),
        None => values,
    };

    Ok(values
        .into_iter()
        .map(|v| match v {
            Packed::Value(x) => Some(scaler.apply(x)),
            Packed::Missing => None,
        })
        .collect())
}

/// One byte-aligned block of `ngroups` values: `reference + raw * increment`.
fn read_block(
    reader: &mut BitReader<'_>,
    ngroups: usize,
    bits: u8,
    reference: i64,
    increment: i64,
) -> Result<Vec<i64>> {
    let values = (0..ngroups)
        .map(|_| Ok(reference + reader.read(bits)? as i64 * increment))
        .collect::<Result<Vec<_>>>()?;
    reader.align();
    Ok(values)
}

fn read_groups(
    reader: &mut BitReader<'_>,
    complex: &ComplexPacking,
    nbits: u8,
    references: &[i64],
    widths: &[i64],
    lengths: &[i64],
    count: usize,
) -> Result<Vec<Packed>> {
    let management = complex.missing_value_management;
    // Missing markers for width-0 groups use the reference width; a field
    // packed with 0 bits has no markers.
    let ref_primary = if nbits == 0 { -1 } else { (1i64 << nbits) - 1 };
    let ref_secondary = if nbits == 0 { -1 } else { ref_primary - 1 };

    let mut values = Vec::with_capacity(count);
    for ((&reference, &width), &length) in references.iter().zip(widths).zip(lengths) {
        let width = u8::try_from(width)
            .ok()
            .filter(|w| *w <= MAX_PACKING_BITS)
            .ok_or(Grib2Error::UnsupportedPackingWidth {
                bits: width.clamp(0, 255) as u8,
            })?;

        if width == 0 {
            let value = match management {
                1 | 2 if reference == ref_primary => Packed::Missing,
                2 if reference == ref_secondary => Packed::Missing,
                _ => Packed::Value(reference),
            };
            values.extend(std::iter::repeat(value).take(length as usize));
            continue;
        }

        let primary = (1i64 << width) - 1;
        let secondary = primary - 1;
        for _ in 0..length {
            let raw = reader.read(width)? as i64;
            values.push(match management {
                1 | 2 if raw == primary => Packed::Missing,
                2 if raw == secondary => Packed::Missing,
                _ => Packed::Value(raw + reference),
            });
        }
    }
    Ok(values)
}

/// Rebuild values from first- or second-order differences. Missing points
/// are skipped; the differences run over present values only.
fn undo_differencing(mut values: Vec<Packed>, order: u8, first: &[i64], minimum: i64) -> Vec<Packed> {
    let mut previous: [i64; 2] = [0, 0];
    let mut n = 0usize;
    for slot in values.iter_mut() {
        let Packed::Value(v) = *slot else {
            continue;
        };
        let rebuilt = if n < order as usize {
            first[n]
        } else if order == 1 {
            v + minimum + previous[1]
        } else {
            v + minimum + 2 * previous[1] - previous[0]
        };
        *slot = Packed::Value(rebuilt);
        previous = [previous[1], rebuilt];
        n += 1;
    }
    values
}
