use liveroute_geo::{GeoLocator, GeoSettings, IpApiLocator};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Serves a single canned JSON response and hands back the request line.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).unwrap() == 0 || header == "\r\n" {
                break;
            }
        }
        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        request_line.trim().to_string()
    });
    let template = format!("http://127.0.0.1:{port}/json/{{ip}}?fields=lat,lon,city,countryCode");
    (template, handle)
}

fn locator(template: String) -> IpApiLocator {
    IpApiLocator::new(&GeoSettings {
        url_template: template,
        timeout: Duration::from_secs(5),
        ..GeoSettings::default()
    })
}

#[test]
fn locate_reads_coordinates_and_place() {
    let (template, server) = serve_once(
        "200 OK",
        r#"{"lat":40.1,"lon":-75.3,"city":"Norwell","countryCode":"US"}"#,
    );

    let point = locator(template).locate("93.184.216.34").unwrap();

    assert_eq!(point.latitude, 40.1);
    assert_eq!(point.longitude, -75.3);
    assert_eq!(point.place, "Norwell, US");
    assert_eq!(
        server.join().unwrap(),
        "GET /json/93.184.216.34?fields=lat,lon,city,countryCode HTTP/1.1"
    );
}

#[test]
fn missing_coordinates_are_absent() {
    let (template, server) = serve_once("200 OK", r#"{"city":"Norwell"}"#);
    assert!(locator(template).locate("93.184.216.34").is_none());
    server.join().unwrap();
}

#[test]
fn malformed_body_is_absent() {
    let (template, server) = serve_once("200 OK", "not json");
    assert!(locator(template).locate("93.184.216.34").is_none());
    server.join().unwrap();
}

#[test]
fn error_status_is_absent() {
    let (template, server) = serve_once("429 Too Many Requests", "{}");
    assert!(locator(template).locate("93.184.216.34").is_none());
    server.join().unwrap();
}

#[test]
fn connection_failure_is_absent() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let template = format!("http://127.0.0.1:{port}/json/{{ip}}");
    assert!(locator(template).locate("93.184.216.34").is_none());
}

#[test]
fn sentinels_and_private_addresses_skip_the_network() {
    // Nothing listens here; a request would fail anyway, but none is made.
    let locator = locator("http://127.0.0.1:9/json/{ip}".to_string());
    assert!(locator.locate("*").is_none());
    assert!(locator.locate("Request timed out").is_none());
    assert!(locator.locate("10.0.0.1").is_none());
}
