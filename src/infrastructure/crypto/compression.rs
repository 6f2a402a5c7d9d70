use std::io::Read;

use flate2::read::GzDecoder;

use super::CodecError;

pub fn decompress(data: &[u8], algorithm: &str) -> Result<Vec<u8>, CodecError> {
    match algorithm.to_ascii_lowercase().as_str() {
        "gzip" => {
            let mut decoder = GzDecoder::new(data);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        other => Err(CodecError::UnsupportedCompression(other.to_string())),
    }
}

#[cfg(test)]
pub fn gzip_for_tests(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
