use dogfetch::{DogService, FetchError};

use crate::cli::args::{ImagesArgs, RandomArgs};
use crate::exit_codes;

pub async fn list_breeds(service: &DogService) -> Result<i32, FetchError> {
    for breed in service.all_breeds().await? {
        println!("{breed}");
    }
    Ok(exit_codes::SUCCESS)
}

pub async fn list_images(service: &DogService, args: ImagesArgs) -> Result<i32, FetchError> {
    let images = service.breed_images(&args.breed).await?;
    let limit = args.limit.unwrap_or(images.len());

    for breed in images.iter().take(limit) {
        println!("{}", breed.image_url);
    }
    if images.len() > limit {
        eprintln!("({} of {} shown)", limit, images.len());
    }
    Ok(exit_codes::SUCCESS)
}

pub async fn random_image(service: &DogService, args: RandomArgs) -> Result<i32, FetchError> {
    let url = service.random_image_url(&args.breed).await?;
    println!("{url}");
    Ok(exit_codes::SUCCESS)
}
