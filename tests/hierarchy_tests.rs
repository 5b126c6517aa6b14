//! End-to-end issuance over the in-memory and file repositories.

use certcenter::x509::verify_cert_signature;
use certcenter::{
    ApplicationController, Certificate, CertificateType, FileCertificateRepository,
    FileOrganizationRepository, FilePrivateKeyRepository, IssuanceDefaults, KeyType,
    MemoryCertificateRepository, MemoryOrganizationRepository, MemoryPrivateKeyRepository,
    Organization, OsRandom, RcgenSigner,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use time::Duration;

fn defaults() -> IssuanceDefaults {
    IssuanceDefaults {
        root_expiration: Duration::days(30),
        expiration: Duration::days(7),
        root_key_type: KeyType::EcdsaP256,
        key_type: KeyType::EcdsaP256,
    }
}

fn memory_app() -> ApplicationController {
    ApplicationController::new(
        Arc::new(MemoryOrganizationRepository::new()),
        Arc::new(MemoryCertificateRepository::new()),
        Arc::new(MemoryPrivateKeyRepository::new()),
        Arc::new(RcgenSigner),
        Arc::new(OsRandom),
        defaults(),
    )
}

fn file_app(root: &Path) -> ApplicationController {
    ApplicationController::new(
        Arc::new(FileOrganizationRepository::new(root)),
        Arc::new(FileCertificateRepository::new(root)),
        Arc::new(FilePrivateKeyRepository::new(root)),
        Arc::new(RcgenSigner),
        Arc::new(OsRandom),
        defaults(),
    )
}

fn assert_signed_by(child: &Certificate, issuer: &Certificate) {
    verify_cert_signature(child.der(), Some(&issuer.info().public_key_der))
        .expect("certificate should verify against its issuer");
    assert_eq!(child.issuer(), issuer.subject());
}

struct Issued {
    root: Certificate,
    intermediate: Certificate,
    server: Certificate,
    client: Certificate,
}

/// Build root -> intermediate -> {server, client} for acme.
fn issue_hierarchy(app: &ApplicationController) -> Issued {
    app.new_organization(Organization::with_names("acme", vec!["Acme Corp".into()]))
        .unwrap();
    let org = app.organization_controller("acme").unwrap();

    let root = org.new_root_certificate("Acme Root CA").unwrap();
    let root_ctl = org.certificate_controller(root.serial_number()).unwrap();
    let (intermediate, _) = root_ctl
        .new_intermediate_certificate("Acme Issuing CA")
        .unwrap();

    let intermediate_ctl = root_ctl
        .child_certificate_controller(intermediate.serial_number())
        .unwrap();
    let (server, server_key) = intermediate_ctl
        .new_server_certificate(&["www.acme.test".into(), "acme.test".into()])
        .unwrap();
    let (client, _) = intermediate_ctl.new_client_certificate("alice").unwrap();

    assert_eq!(
        server_key.public_key().to_public_key_der().unwrap(),
        server.info().public_key_der
    );

    Issued {
        root,
        intermediate,
        server,
        client,
    }
}

fn check_hierarchy(app: &ApplicationController, issued: &Issued) {
    let Issued {
        root,
        intermediate,
        server,
        client,
    } = issued;

    assert_eq!(root.certificate_type(), Some(CertificateType::Root));
    assert_eq!(
        intermediate.certificate_type(),
        Some(CertificateType::Intermediate)
    );
    assert_eq!(server.certificate_type(), Some(CertificateType::Server));
    assert_eq!(client.certificate_type(), Some(CertificateType::Client));

    assert_eq!(intermediate.parents(), &[root.serial_number().clone()]);
    assert_eq!(server.parents(), intermediate.chain().as_slice());
    assert_eq!(client.signed_by(), intermediate.serial_number());

    verify_cert_signature(root.der(), None).unwrap();
    assert_signed_by(intermediate, root);
    assert_signed_by(server, intermediate);
    assert_signed_by(client, intermediate);

    assert!(intermediate.info().max_path_len_zero());
    assert_eq!(server.common_name(), Some("www.acme.test"));
    assert_eq!(server.dns_names(), &["www.acme.test", "acme.test"]);
    assert_eq!(client.organization_name(), Some("Acme Corp"));

    let org = app.organization_controller("acme").unwrap();
    assert_eq!(org.certificate_collection().unwrap(), vec![root.clone()]);

    let root_ctl = org.certificate_controller(root.serial_number()).unwrap();
    assert_eq!(
        root_ctl.child_certificate_collection(None).unwrap(),
        vec![intermediate.clone()]
    );

    let intermediate_ctl = root_ctl
        .child_certificate_controller(intermediate.serial_number())
        .unwrap();
    let children = intermediate_ctl.child_certificate_collection(None).unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(
        intermediate_ctl
            .child_certificate_collection(Some(CertificateType::Server))
            .unwrap(),
        vec![server.clone()]
    );
    assert_eq!(
        intermediate_ctl
            .child_certificate_collection(Some(CertificateType::Client))
            .unwrap(),
        vec![client.clone()]
    );

    let server_ctl = intermediate_ctl
        .child_certificate_controller(server.serial_number())
        .unwrap();
    assert_eq!(
        server_ctl.parent_certificate(),
        Some(intermediate_ctl.certificate())
    );
    assert_eq!(
        server_ctl
            .parent_certificate_controller()
            .and_then(|p| p.parent_certificate())
            .map(|c| c.serial_number()),
        Some(root.serial_number())
    );

    let key = server_ctl.private_key().unwrap();
    assert_eq!(
        key.public_key().to_public_key_der().unwrap(),
        server.info().public_key_der
    );
    let message = b"hierarchy";
    let signature = key.sign(message).unwrap();
    key.public_key().verify(message, &signature).unwrap();
}

#[test]
fn test_hierarchy_in_memory() {
    let app = memory_app();
    let issued = issue_hierarchy(&app);
    check_hierarchy(&app, &issued);
}

#[test]
fn test_hierarchy_on_disk_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let issued = {
        let app = file_app(dir.path());
        let issued = issue_hierarchy(&app);
        check_hierarchy(&app, &issued);
        issued
    };

    let reopened = file_app(dir.path());
    assert_eq!(
        reopened.organization("acme").unwrap().name(),
        "Acme Corp"
    );
    check_hierarchy(&reopened, &issued);
}

#[test]
fn test_organizations_are_isolated() {
    let app = memory_app();
    let issued = issue_hierarchy(&app);
    app.new_organization(Organization::with_names("globex", vec!["Globex".into()]))
        .unwrap();

    let globex = app.organization_controller("globex").unwrap();
    assert!(globex.certificate_collection().unwrap().is_empty());
    let err = globex
        .certificate_controller(issued.root.serial_number())
        .err()
        .unwrap();
    assert!(err.is_not_found());
}

#[test]
fn test_concurrent_issuance_gives_unique_serials() {
    let app = memory_app();
    app.new_organization(Organization::with_names("acme", vec!["Acme Corp".into()]))
        .unwrap();
    let org = app.organization_controller("acme").unwrap();
    let root = org.new_root_certificate("Acme Root CA").unwrap();

    let issued: Vec<Certificate> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let app = &app;
                let root = &root;
                scope.spawn(move || {
                    let org = app.organization_controller("acme").unwrap();
                    let ca = org.certificate_controller(root.serial_number()).unwrap();
                    (0..3)
                        .map(|j| {
                            ca.new_client_certificate(&format!("client-{}-{}", i, j))
                                .unwrap()
                                .0
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let serials: HashSet<_> = issued.iter().map(|c| c.serial_number().clone()).collect();
    assert_eq!(serials.len(), 12);

    let ca = org.certificate_controller(root.serial_number()).unwrap();
    assert_eq!(ca.child_certificate_collection(None).unwrap().len(), 12);
}

#[test]
fn test_root_and_leaf_for_each_key_type() {
    // RSA 3072 and 4096 behave like 2048 and are slow to generate.
    for key_type in KeyType::ALL
        .into_iter()
        .filter(|k| !matches!(k, KeyType::Rsa3072 | KeyType::Rsa4096))
    {
        let app = memory_app();
        app.new_organization(Organization::with_names("acme", vec!["Acme Corp".into()]))
            .unwrap();
        let mut org = app.organization_controller("acme").unwrap();

        if !key_type.supports_certificates() {
            let err = org.set_key_type(key_type).unwrap_err();
            assert!(err.is_precondition(), "{}: {}", key_type, err);
            assert!(org.certificate_collection().unwrap().is_empty());
            continue;
        }

        org.set_key_type(key_type).unwrap();
        let root = org.new_root_certificate("Acme Root CA").unwrap();
        verify_cert_signature(root.der(), None).unwrap();

        let mut root_ctl = org.certificate_controller(root.serial_number()).unwrap();
        root_ctl.set_key_type(key_type).unwrap();
        let (server, key) = root_ctl
            .new_server_certificate(&["www.acme.test".into()])
            .unwrap();
        assert_eq!(key.key_type(), key_type);
        assert_signed_by(&server, &root);
        assert_eq!(root_ctl.private_key().unwrap().key_type(), key_type);
    }
}
