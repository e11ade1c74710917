//! Native multi-band GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Two band layouts are understood: a single IFD
//! with several samples per pixel (pixel-interleaved), and one single-sample
//! IFD per band. Georeferencing comes from the first IFD.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, MultibandRaster};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray64Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::debug;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
/// GeoKey value for a user-defined (non-EPSG) system
const USER_DEFINED: u16 = 32767;

/// Resolve a GeoTIFF tag code to whatever variant the `tiff` crate uses for it
fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Read every band of a GeoTIFF file
pub fn read_multiband<P: AsRef<Path>>(path: P) -> Result<MultibandRaster> {
    let file = File::open(path.as_ref())?;
    decode_multiband(BufReader::new(file))
}

/// Read every band of a GeoTIFF held in memory
pub fn read_multiband_from_buffer(data: &[u8]) -> Result<MultibandRaster> {
    decode_multiband(Cursor::new(data))
}

fn decode_multiband<R: Read + Seek>(reader: R) -> Result<MultibandRaster> {
    let mut decoder = Decoder::new(reader)
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    // Georeferencing lives on the first IFD
    let transform = read_geotransform(&mut decoder).unwrap_or_default();
    let crs = read_crs(&mut decoder);
    let nodata = read_nodata(&mut decoder);

    let mut bands: Vec<Vec<f64>> = Vec::new();
    loop {
        let page = decoder
            .read_image()
            .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;
        bands.extend(deinterleave(to_f64(page)?, rows, cols)?);

        if !decoder.more_images() {
            break;
        }
        decoder
            .next_image()
            .map_err(|e| Error::Other(format!("Cannot advance to next IFD: {}", e)))?;

        let (w, h) = decoder
            .dimensions()
            .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
        if (w, h) != (width, height) {
            // Overviews or masks follow the band pages
            debug!("Stopping at IFD of size {}x{} (bands are {}x{})", w, h, width, height);
            break;
        }
    }

    let band_count = bands.len();
    let data: Vec<f64> = bands.into_iter().flatten().collect();
    let mut raster = MultibandRaster::from_vec(data, band_count, rows, cols)?
        .with_transform(transform)
        .with_crs(crs);
    raster.set_nodata(nodata);

    debug!("Decoded {} band(s) of {}x{}", band_count, cols, rows);
    Ok(raster)
}

fn to_f64(result: DecodingResult) -> Result<Vec<f64>> {
    let data = match result {
        DecodingResult::F64(buf) => buf,
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF sample format".to_string(),
            ));
        }
    };
    Ok(data)
}

/// Split a pixel-interleaved buffer into one vector per sample
fn deinterleave(buf: Vec<f64>, rows: usize, cols: usize) -> Result<Vec<Vec<f64>>> {
    let pixels = rows * cols;
    if pixels == 0 || buf.len() % pixels != 0 {
        return Err(Error::InvalidDimensions {
            bands: 0,
            width: cols,
            height: rows,
        });
    }

    let samples = buf.len() / pixels;
    if samples == 1 {
        return Ok(vec![buf]);
    }

    let mut bands = vec![Vec::with_capacity(pixels); samples];
    for chunk in buf.chunks_exact(samples) {
        for (band, &v) in bands.iter_mut().zip(chunk) {
            band.push(v);
        }
    }
    Ok(bands)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(geo_tag(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(geo_tag(MODEL_TIEPOINT)).ok();

    if let (Some(scale), Some(tiepoint)) = (&scale, &tiepoint)
        && let Some(gt) = GeoTransform::from_scale_tiepoint(scale, tiepoint)
    {
        return Some(gt);
    }

    let matrix = decoder.get_tag_f64_vec(geo_tag(MODEL_TRANSFORMATION)).ok()?;
    GeoTransform::from_model_transformation(&matrix)
}

/// EPSG code from ProjectedCSTypeGeoKey, falling back to GeographicTypeGeoKey.
/// A user-defined projection leaves the CRS unknown.
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(geo_tag(GEO_KEY_DIRECTORY)).ok()?;
    if keys.len() < 4 {
        return None;
    }

    let num_keys = keys[3] as usize;
    let mut geographic = None;
    for entry in keys[4..].chunks_exact(4).take(num_keys) {
        let (key_id, location, value) = (entry[0], entry[1], entry[3]);
        // location != 0 means the value lives in another tag
        if location != 0 || value == 0 {
            continue;
        }
        match key_id {
            PROJECTED_CS_TYPE_KEY if value == USER_DEFINED => return None,
            PROJECTED_CS_TYPE_KEY => return Some(CRS::from_epsg(value as u32)),
            GEOGRAPHIC_TYPE_KEY if value != USER_DEFINED => {
                geographic = Some(CRS::from_epsg(value as u32))
            }
            _ => {}
        }
    }
    geographic
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(geo_tag(GDAL_NODATA)).ok()?;
    text.trim_end_matches('\0').trim().parse::<f64>().ok()
}

/// Write a stack as a multi-page GeoTIFF, one 64-bit float page per band
pub fn write_multiband<P: AsRef<Path>>(raster: &MultibandRaster, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    encode_multiband(raster, file)
}

/// Write a stack to an in-memory GeoTIFF buffer
pub fn write_multiband_to_buffer(raster: &MultibandRaster) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_multiband(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_multiband<W: Write + Seek>(raster: &MultibandRaster, writer: W) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let gt = raster.transform();

    for b in 0..raster.band_count() {
        let data: Vec<f64> = raster
            .band(b)
            .map(|band| band.iter().copied().collect())
            .unwrap_or_default();

        let mut image = encoder
            .new_image::<Gray64Float>(cols as u32, rows as u32)
            .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

        if b == 0 {
            let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
            image
                .encoder()
                .write_tag(geo_tag(MODEL_PIXEL_SCALE), &scale[..])
                .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

            let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
            image
                .encoder()
                .write_tag(geo_tag(MODEL_TIEPOINT), &tiepoint[..])
                .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

            let geokeys = geokey_directory(raster.crs());
            image
                .encoder()
                .write_tag(geo_tag(GEO_KEY_DIRECTORY), geokeys.as_slice())
                .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

            if let Some(nodata) = raster.nodata() {
                image
                    .encoder()
                    .write_tag(geo_tag(GDAL_NODATA), nodata.to_string().as_str())
                    .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
            }
        }

        image
            .write_data(&data)
            .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
    }

    Ok(())
}

fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    // RasterPixelIsArea
    let mut keys = vec![GT_RASTER_TYPE_KEY, 0, 1, 1];

    if let Some(code) = crs.and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok()) {
        if code == 4326 {
            keys.extend([GT_MODEL_TYPE_KEY, 0, 1, 2, GEOGRAPHIC_TYPE_KEY, 0, 1, code]);
        } else {
            keys.extend([GT_MODEL_TYPE_KEY, 0, 1, 1, PROJECTED_CS_TYPE_KEY, 0, 1, code]);
        }
    }

    // Keys must be sorted by id
    let mut entries: Vec<[u16; 4]> = keys
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect();
    entries.sort_by_key(|e| e[0]);

    let mut out = vec![1, 1, 0, entries.len() as u16];
    out.extend(entries.into_iter().flatten());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deinterleave_chunky() {
        // 2x1 pixels, 3 samples
        let buf = vec![1.0, 10.0, 100.0, 2.0, 20.0, 200.0];
        let bands = deinterleave(buf, 1, 2).unwrap();
        assert_eq!(bands, vec![vec![1.0, 2.0], vec![10.0, 20.0], vec![100.0, 200.0]]);
    }

    #[test]
    fn test_deinterleave_rejects_partial() {
        assert!(deinterleave(vec![0.0; 5], 2, 2).is_err());
    }

    #[test]
    fn test_geokey_directory_sorted() {
        let keys = geokey_directory(Some(&CRS::from_epsg(32630)));
        assert_eq!(&keys[..4], &[1, 1, 0, 3]);
        assert_eq!(keys[4], GT_MODEL_TYPE_KEY);
        assert_eq!(keys[8], GT_RASTER_TYPE_KEY);
        assert_eq!(keys[12], PROJECTED_CS_TYPE_KEY);
        assert_eq!(keys[15], 32630);
    }

    #[test]
    fn test_buffer_roundtrip() {
        let data: Vec<f64> = (0..3 * 4 * 5).map(|v| v as f64 * 0.25).collect();
        let raster = MultibandRaster::from_vec(data, 3, 4, 5)
            .unwrap()
            .with_transform(GeoTransform::new(680_000.0, 4_190_000.0, 20.0, -20.0))
            .with_crs(Some(CRS::from_epsg(32630)));

        let buf = write_multiband_to_buffer(&raster).unwrap();
        let loaded = read_multiband_from_buffer(&buf).unwrap();

        assert_eq!(loaded.band_count(), 3);
        assert_eq!(loaded.shape(), (4, 5));
        assert_eq!(loaded.pixel(3, 4).unwrap(), raster.pixel(3, 4).unwrap());
        assert_eq!(loaded.transform(), raster.transform());
        assert_eq!(loaded.crs().and_then(CRS::epsg), Some(32630));
    }

    #[test]
    fn test_user_defined_crs_reads_as_unknown() {
        let raster = MultibandRaster::from_vec(vec![0.5; 2 * 2 * 2], 2, 2, 2)
            .unwrap()
            .with_transform(GeoTransform::new(680_000.0, 4_190_000.0, 20.0, -20.0))
            .with_crs(Some(CRS::from_epsg(32767)));

        let buf = write_multiband_to_buffer(&raster).unwrap();
        let loaded = read_multiband_from_buffer(&buf).unwrap();
        assert!(loaded.crs().is_none());
    }
}
