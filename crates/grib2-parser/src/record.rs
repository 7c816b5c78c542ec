//! Records produced by the scanner.

use crate::error::Result;
use crate::sections::{
    BitmapView, ByteSpan, DataRepresentationView, GridDefinitionView, IdentificationView,
    IndicatorView, ProductDefinitionView, Section,
};
use crate::unpacking::{self, UnpackOptions, UnpackedGrid};
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Sections needed to derive coordinates of a product, shared by scanner
/// records and indexed records.
pub trait ProductRecord {
    fn indicator(&self) -> &Section;
    fn identification(&self) -> &Section;
    fn product_definition(&self) -> &Section;
    fn data_representation(&self) -> &Section;

    fn discipline(&self) -> Result<u8> {
        IndicatorView::new(self.indicator()).discipline()
    }

    fn reference_time(&self) -> Result<DateTime<Utc>> {
        IdentificationView::new(self.identification()).reference_time()
    }

    fn pds(&self) -> ProductDefinitionView<'_> {
        ProductDefinitionView::new(self.product_definition())
    }

    fn drs(&self) -> DataRepresentationView<'_> {
        DataRepresentationView::new(self.data_representation())
    }

    /// `(discipline, category, number)`.
    fn parameter(&self) -> Result<(u8, u8, u8)> {
        let pds = self.pds();
        Ok((
            self.discipline()?,
            pds.parameter_category()?,
            pds.parameter_number()?,
        ))
    }
}

/// One product of a GRIB2 message with every section it depends on.
///
/// A message carrying several products yields one record per data section;
/// sections not repeated before a data section are shared with the previous
/// record of the same message.
#[derive(Debug, Clone)]
pub struct Record {
    pub file_index: u32,
    /// Offset of the `GRIB` marker of the enclosing message.
    pub start_offset: u64,
    pub message_length: u64,
    /// Position of this product within its message, starting at 0.
    pub repeat: u32,
    pub indicator: Section,
    pub identification: Section,
    pub local_use: Option<Section>,
    pub grid_definition: Section,
    pub product_definition: Section,
    pub data_representation: Section,
    /// Bitmap indicator as found in the message (255 when no bitmap section).
    pub bitmap_indicator: u8,
    /// Bitmap that applies to this record, resolved through indicator 254.
    pub bitmap: Option<Section>,
    pub data_span: ByteSpan,
    /// Packed data, without the 5-byte section header.
    pub data: Bytes,
}

impl Record {
    pub fn gds(&self) -> GridDefinitionView<'_> {
        GridDefinitionView::new(&self.grid_definition)
    }

    pub fn bitmap_view(&self) -> Option<BitmapView<'_>> {
        self.bitmap.as_ref().map(BitmapView::new)
    }

    /// Offset where the `7777` end marker of the message sits.
    pub fn end_marker_offset(&self) -> u64 {
        self.start_offset + self.message_length - 4
    }

    pub fn unpack(&self, options: &UnpackOptions) -> Result<UnpackedGrid> {
        unpacking::unpack(
            &self.data_representation,
            self.bitmap.as_ref(),
            &self.data,
            self.gds().shape()?,
            options,
        )
    }
}

impl ProductRecord for Record {
    fn indicator(&self) -> &Section {
        &self.indicator
    }

    fn identification(&self) -> &Section {
        &self.identification
    }

    fn product_definition(&self) -> &Section {
        &self.product_definition
    }

    fn data_representation(&self) -> &Section {
        &self.data_representation
    }
}
