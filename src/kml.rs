//! Very simple functions for producing KML files suited to the launch site reports.
//!
//! This only implements the parts of KML the reports need, with a streaming API. That means the
//! user is responsible for closing all tags.

use crate::{error::LaunchSiteError, LaunchSiteResult};
use chrono::{DateTime, Utc};
use std::{
    borrow::Cow,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

/// A KML document written to any output, most often a file.
///
/// Call `finish` to close the document and see any errors. If it is dropped without that, the
/// document is still closed but errors are lost.
pub struct KmlFile<W: Write> {
    out: W,
    finished: bool,
}

impl KmlFile<BufWriter<File>> {
    pub fn new<P: AsRef<Path>>(pth: P) -> LaunchSiteResult<Self> {
        let p = pth.as_ref();

        let f = File::create(p).map_err(|err| LaunchSiteError::io(p, err))?;
        KmlFile::from_writer(BufWriter::new(f))
    }
}

impl<W: Write> KmlFile<W> {
    pub fn from_writer(writer: W) -> LaunchSiteResult<Self> {
        let mut new = KmlFile {
            out: writer,
            finished: false,
        };
        new.start_document()?;
        Ok(new)
    }

    /// Write the document footer and flush the output.
    pub fn finish(mut self) -> LaunchSiteResult<()> {
        self.finished = true;
        self.finish_document()?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> KmlWriter for KmlFile<W> {
    fn output(&mut self) -> &mut dyn Write {
        &mut self.out
    }
}

impl<W: Write> Drop for KmlFile<W> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.finish_document();
            let _ = self.out.flush();
        }
    }
}

/// A zipped KML document.
///
/// The KML goes in a single `doc.kml` entry. As with [KmlFile], `finish` closes the archive and
/// reports errors, dropping it closes the archive quietly.
pub struct KmzFile {
    zip: ZipWriter<File>,
    finished: bool,
}

impl KmzFile {
    pub fn new<P: AsRef<Path>>(pth: P) -> LaunchSiteResult<Self> {
        let p = pth.as_ref();

        let f = File::create(p).map_err(|err| LaunchSiteError::io(p, err))?;
        let mut zip = ZipWriter::new(f);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file("doc.kml", options)?;

        let mut new = KmzFile {
            zip,
            finished: false,
        };
        new.start_document()?;
        Ok(new)
    }

    /// Write the document footer and the zip central directory.
    pub fn finish(mut self) -> LaunchSiteResult<()> {
        self.finished = true;
        self.finish_document()?;
        let mut f = self.zip.finish()?;
        f.flush()?;
        Ok(())
    }
}

impl KmlWriter for KmzFile {
    fn output(&mut self) -> &mut dyn Write {
        &mut self.zip
    }
}

impl Drop for KmzFile {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.finish_document();
            let _ = self.zip.finish();
        }
    }
}

/// Escape the characters that would break XML element text.
fn escape(text: &str) -> Cow<str> {
    if !text.contains(|c| matches!(c, '&' | '<' | '>')) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }

    Cow::Owned(escaped)
}

pub trait KmlWriter {
    fn output(&mut self) -> &mut dyn Write;

    /// Put the header out.
    fn start_document(&mut self) -> LaunchSiteResult<()> {
        const HEADER: &str = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#,
            "\n",
            "<Document>\n"
        );

        self.output().write_all(HEADER.as_bytes())?;

        Ok(())
    }

    /// Close a document.
    fn finish_document(&mut self) -> LaunchSiteResult<()> {
        const FOOTER: &str = concat!(r#"</Document>"#, "\n", r#"</kml>"#, "\n");
        self.output().write_all(FOOTER.as_bytes())?;
        Ok(())
    }

    /// Write a description element to the file.
    fn write_description(&mut self, description: &str) -> LaunchSiteResult<()> {
        writeln!(
            self.output(),
            "<description><![CDATA[{}]]></description>",
            description
        )?;
        Ok(())
    }

    /// Start a KML folder.
    fn start_folder(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        is_open: bool,
    ) -> LaunchSiteResult<()> {
        self.output().write_all("<Folder>\n".as_bytes())?;

        if let Some(name) = name {
            writeln!(self.output(), "<name>{}</name>", escape(name))?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if is_open {
            self.output().write_all("<open>1</open>\n".as_bytes())?;
        }

        Ok(())
    }

    /// Close out a folder element
    fn finish_folder(&mut self) -> LaunchSiteResult<()> {
        writeln!(self.output(), "</Folder>")?;
        Ok(())
    }

    /// Start a placemark element.
    fn start_placemark(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        style_url: Option<&str>,
    ) -> LaunchSiteResult<()> {
        writeln!(self.output(), "<Placemark>")?;

        if let Some(name) = name {
            writeln!(self.output(), "<name>{}</name>", escape(name))?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if let Some(style_url) = style_url {
            writeln!(self.output(), "<styleUrl>{}</styleUrl>", style_url)?;
        }

        Ok(())
    }

    /// Close out a placemark element.
    fn finish_placemark(&mut self) -> LaunchSiteResult<()> {
        writeln!(self.output(), "</Placemark>")?;
        Ok(())
    }

    /// Start a style definition.
    fn start_style(&mut self, style_id: Option<&str>) -> LaunchSiteResult<()> {
        if let Some(style_id) = style_id {
            writeln!(self.output(), "<Style id=\"{}\">", style_id)?;
        } else {
            writeln!(self.output(), "<Style>")?;
        }
        Ok(())
    }

    /// Close out a style definition.
    fn finish_style(&mut self) -> LaunchSiteResult<()> {
        writeln!(self.output(), "</Style>")?;
        Ok(())
    }

    /// Create a PolyStyle element.
    ///
    /// These should ONLY go inside a style element.
    fn create_poly_style(
        &mut self,
        color: Option<&str>,
        filled: bool,
        outlined: bool,
    ) -> LaunchSiteResult<()> {
        writeln!(self.output(), "<PolyStyle>")?;

        if let Some(color) = color {
            writeln!(self.output(), "<color>{}</color>", color)?;
            writeln!(self.output(), "<colorMode>normal</colorMode>")?;
        } else {
            writeln!(self.output(), "<colorMode>random</colorMode>")?;
        }

        let filled = if filled { 1 } else { 0 };
        let outlined = if outlined { 1 } else { 0 };

        writeln!(self.output(), "<fill>{}</fill>", filled)?;
        writeln!(self.output(), "<outline>{}</outline>", outlined)?;

        writeln!(self.output(), "</PolyStyle>")?;
        Ok(())
    }

    /// Create an IconStyle element.
    fn create_icon_style(&mut self, icon_url: Option<&str>, scale: f64) -> LaunchSiteResult<()> {
        writeln!(self.output(), "<IconStyle>")?;

        if scale > 0.0 {
            writeln!(self.output(), "<scale>{}</scale>", scale)?;
        } else {
            writeln!(self.output(), "<scale>1</scale>")?;
        }

        if let Some(icon_url) = icon_url {
            writeln!(self.output(), "<Icon><href>{}</href></Icon>", icon_url)?;
        }

        writeln!(self.output(), "</IconStyle>")?;
        Ok(())
    }

    /// Write out a TimeSpan element.
    fn timespan(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> LaunchSiteResult<()> {
        self.output().write_all("<TimeSpan>\n".as_bytes())?;
        writeln!(
            self.output(),
            "<begin>{}</begin>",
            start.format("%Y-%m-%dT%H:%M:%S.000Z")
        )?;
        writeln!(
            self.output(),
            "<end>{}</end>",
            end.format("%Y-%m-%dT%H:%M:%S.000Z")
        )?;
        self.output().write_all("</TimeSpan>\n".as_bytes())?;
        Ok(())
    }

    /// Start a MultiGeometry
    fn start_multi_geometry(&mut self) -> LaunchSiteResult<()> {
        self.output().write_all("<MultiGeometry>\n".as_bytes())?;
        Ok(())
    }

    /// Close out a MultiGeometry
    fn finish_multi_geometry(&mut self) -> LaunchSiteResult<()> {
        self.output().write_all("</MultiGeometry>\n".as_bytes())?;
        Ok(())
    }

    /// Start a Polygon element.
    fn start_polygon(&mut self, tessellate: bool) -> LaunchSiteResult<()> {
        self.output().write_all("<Polygon>\n".as_bytes())?;

        if tessellate {
            self.output()
                .write_all("<tessellate>1</tessellate>\n".as_bytes())?;
        }

        Ok(())
    }

    /// Close out a Polygon element.
    fn finish_polygon(&mut self) -> LaunchSiteResult<()> {
        self.output().write_all("</Polygon>\n".as_bytes())?;
        Ok(())
    }

    /// Start the polygon outer ring.
    ///
    /// This should only be used inside a Polygon element.
    fn polygon_start_outer_ring(&mut self) -> LaunchSiteResult<()> {
        self.output().write_all("<outerBoundaryIs>\n".as_bytes())?;
        Ok(())
    }

    /// End the polygon outer ring.
    ///
    /// This should only be used inside a Polygon element.
    fn polygon_finish_outer_ring(&mut self) -> LaunchSiteResult<()> {
        self.output().write_all("</outerBoundaryIs>\n".as_bytes())?;
        Ok(())
    }

    /// Start a LinearRing.
    fn start_linear_ring(&mut self) -> LaunchSiteResult<()> {
        self.output()
            .write_all("<LinearRing>\n<coordinates>\n".as_bytes())?;
        Ok(())
    }

    /// End a LinearRing.
    fn finish_linear_ring(&mut self) -> LaunchSiteResult<()> {
        self.output()
            .write_all("</coordinates>\n</LinearRing>\n".as_bytes())?;
        Ok(())
    }

    /// Add a vertex to the LinearRing
    ///
    /// Must be used inside a linear ring element.
    fn linear_ring_add_vertex(&mut self, lat: f64, lon: f64, z: f64) -> LaunchSiteResult<()> {
        writeln!(self.output(), "{},{},{}", lon, lat, z)?;
        Ok(())
    }

    /// Write out a KML Point element
    fn create_point(&mut self, lat: f64, lon: f64, z: f64) -> LaunchSiteResult<()> {
        writeln!(
            self.output(),
            "<Point>\n<coordinates>{},{},{}</coordinates>\n</Point>",
            lon,
            lat,
            z
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io;

    /// Accepts nothing, like a full disk.
    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_kml_document() {
        let mut buf: Vec<u8> = vec![];

        let mut kml = KmlFile::from_writer(&mut buf).unwrap();
        kml.start_folder(Some("sites"), None, true).unwrap();
        kml.start_placemark(Some("1"), Some("<b>5 predictions</b>"), Some("#site"))
            .unwrap();
        kml.create_point(45.5, -120.25, 0.0).unwrap();
        kml.finish_placemark().unwrap();
        kml.finish_folder().unwrap();
        kml.finish().unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(text.contains("<coordinates>-120.25,45.5,0</coordinates>"));
        assert!(text.contains("<description><![CDATA[<b>5 predictions</b>]]></description>"));
        assert!(text.contains("<open>1</open>"));
        assert!(text.ends_with("</Document>\n</kml>\n"));
        assert_eq!(text.matches("</kml>").count(), 1);
    }

    #[test]
    fn test_kml_document_is_closed_on_drop() {
        let mut buf: Vec<u8> = vec![];
        {
            let mut kml = KmlFile::from_writer(&mut buf).unwrap();
            kml.start_folder(None, None, false).unwrap();
            kml.finish_folder().unwrap();
        }

        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with("</Document>\n</kml>\n"));
    }

    #[test]
    fn test_finish_reports_write_errors() {
        // The buffer holds everything until the final flush.
        let mut kml = KmlFile::from_writer(BufWriter::new(FullDisk)).unwrap();
        kml.start_folder(Some("sites"), None, true).unwrap();
        kml.finish_folder().unwrap();

        assert!(kml.finish().is_err());
    }

    #[test]
    fn test_names_are_escaped() {
        let mut buf: Vec<u8> = vec![];

        let mut kml = KmlFile::from_writer(&mut buf).unwrap();
        kml.start_folder(Some("Sites <new>"), None, false).unwrap();
        kml.finish_folder().unwrap();
        kml.start_placemark(Some("R&S<1>"), None, None).unwrap();
        kml.finish_placemark().unwrap();
        kml.finish().unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("<name>Sites &lt;new&gt;</name>"));
        assert!(text.contains("<name>R&amp;S&lt;1&gt;</name>"));
        assert_eq!(escape("S1234567"), Cow::Borrowed("S1234567"));
    }
}
